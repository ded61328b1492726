// Spreadsheet reading (xlsx, xls, xlsb, ods) via calamine

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use tracing::debug;

use inventa_core::Cell;

use crate::error::SourceError;

/// Cells of the first worksheet with the worksheet row number (1-based) of
/// each row. The first row is a header and is not returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRows {
    pub rows: Vec<(usize, Vec<Cell>)>,
}

pub fn read_first_sheet(path: &Path) -> Result<SheetRows, SourceError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| SourceError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| SourceError::NoSheets(path.to_path_buf()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| SourceError::Workbook {
            path: path.to_path_buf(),
            message: format!("failed to read sheet '{sheet_name}': {e}"),
        })?;

    // The range starts at the first used cell, not necessarily A1.
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let first_col = range.start().map(|(_, c)| c as usize).unwrap_or(0);

    let rows = range
        .rows()
        .enumerate()
        .skip(1)
        .map(|(i, row)| {
            let mut cells = vec![Cell::Empty; first_col];
            cells.extend(row.iter().map(cell_from));
            (first_row + i + 1, cells)
        })
        .collect::<Vec<_>>();

    debug!(sheet = %sheet_name, rows = rows.len(), "read worksheet");
    Ok(SheetRows { rows })
}

fn cell_from(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Int(*n),
        Data::Bool(b) => Cell::Bool(*b),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn reads_rows_after_header_with_sheet_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventario.xlsx");

        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.write_string(0, 0, "Codigo").unwrap();
        ws.write_string(0, 1, "Nombre").unwrap();
        ws.write_number(1, 0, 123456789.0).unwrap();
        ws.write_string(1, 1, "Amoxicilina 500mg").unwrap();
        ws.write_string(1, 9, "GENFAR").unwrap();
        wb.save(&path).unwrap();

        let sheet = read_first_sheet(&path).unwrap();
        assert_eq!(sheet.rows.len(), 1);
        let (line, cells) = &sheet.rows[0];
        assert_eq!(*line, 2);
        assert_eq!(cells[0].as_text(), "123456789");
        assert_eq!(cells[1], Cell::Text("Amoxicilina 500mg".into()));
        assert_eq!(cells[9], Cell::Text("GENFAR".into()));
    }

    #[test]
    fn not_a_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.xlsx");
        std::fs::write(&path, "Codigo,Nombre\n").unwrap();
        assert!(matches!(read_first_sheet(&path), Err(SourceError::Workbook { .. })));
    }
}
