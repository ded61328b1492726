use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use inventa_core::{RawRow, RowSource, SourceFormat, SourceStatus};

use crate::error::SourceError;
use crate::sheet::{read_first_sheet, SheetRows};
use crate::text::read_text;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Decide how to read `path`.
///
/// Workbooks always carry a ZIP (xlsx, xlsb, ods) or OLE (xls) signature, so
/// a readable file without one is text whatever its extension says. The
/// extension is only consulted when the file cannot be read.
pub fn probe_format(path: &Path) -> SourceFormat {
    let mut head = [0u8; 8];
    let read = std::fs::File::open(path).and_then(|mut f| {
        let mut n = 0;
        while n < head.len() {
            match f.read(&mut head[n..])? {
                0 => break,
                k => n += k,
            }
        }
        Ok(n)
    });

    match read {
        Ok(n) if head[..n].starts_with(ZIP_MAGIC) || head[..n].starts_with(OLE_MAGIC) => SourceFormat::Spreadsheet,
        Ok(_) => SourceFormat::Delimited,
        Err(_) => path
            .extension()
            .and_then(|e| e.to_str())
            .map(SourceFormat::from_extension)
            .unwrap_or(SourceFormat::Delimited),
    }
}

#[derive(Debug, Clone)]
enum Content {
    Text(String),
    Sheet(SheetRows),
    Absent,
}

/// A source file held in memory, iterated as [`RawRow`]s.
///
/// Decoding happens once in [`TabularSource::open`]; every call to
/// [`RowSource::rows`] walks the decoded content again.
#[derive(Debug, Clone)]
pub struct TabularSource {
    path: PathBuf,
    format: SourceFormat,
    content: Content,
}

impl TabularSource {
    /// Open `path`, probing the format unless one is given. A missing file is
    /// not an error: the source reports [`SourceStatus::NotFound`] and yields
    /// no rows.
    pub fn open(path: &Path, format: Option<SourceFormat>) -> Result<Self, SourceError> {
        let format = format.unwrap_or_else(|| probe_format(path));

        if !path.exists() {
            warn!(path = %path.display(), "source file not found");
            return Ok(Self {
                path: path.to_path_buf(),
                format,
                content: Content::Absent,
            });
        }

        let content = match format {
            SourceFormat::Delimited => Content::Text(read_text(path)?),
            SourceFormat::Spreadsheet => Content::Sheet(read_first_sheet(path)?),
        };
        info!(path = %path.display(), %format, "opened source");

        Ok(Self {
            path: path.to_path_buf(),
            format,
            content,
        })
    }

    /// Text already in memory, e.g. from stdin.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            path: PathBuf::from("-"),
            format: SourceFormat::Delimited,
            content: Content::Text(text.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSource for TabularSource {
    fn format(&self) -> SourceFormat {
        self.format
    }

    fn status(&self) -> SourceStatus {
        match self.content {
            Content::Absent => SourceStatus::NotFound,
            _ => SourceStatus::Found,
        }
    }

    fn rows(&self) -> Box<dyn Iterator<Item = RawRow> + '_> {
        match &self.content {
            Content::Text(text) => Box::new(text.lines().enumerate().map(|(i, l)| RawRow::line(i + 1, l))),
            Content::Sheet(sheet) => Box::new(
                sheet
                    .rows
                    .iter()
                    .map(|(line, cells)| RawRow::cells(*line, cells.clone())),
            ),
            Content::Absent => Box::new(std::iter::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_by_signature_not_extension() {
        let dir = tempfile::tempdir().unwrap();

        let disguised = dir.path().join("export.xls");
        std::fs::write(&disguised, "Codigo\tNombre\n").unwrap();
        assert_eq!(probe_format(&disguised), SourceFormat::Delimited);

        let zipped = dir.path().join("export.bin");
        std::fs::write(&zipped, b"PK\x03\x04rest-of-archive").unwrap();
        assert_eq!(probe_format(&zipped), SourceFormat::Spreadsheet);

        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(probe_format(&empty), SourceFormat::Delimited);
    }

    #[test]
    fn probe_missing_file_uses_extension() {
        assert_eq!(probe_format(Path::new("/nope/inventario.xlsx")), SourceFormat::Spreadsheet);
        assert_eq!(probe_format(Path::new("/nope/inventario.csv")), SourceFormat::Delimited);
    }

    #[test]
    fn missing_file_is_not_found_with_no_rows() {
        let src = TabularSource::open(Path::new("/nope/inventario.csv"), None).unwrap();
        assert_eq!(src.status(), SourceStatus::NotFound);
        assert_eq!(src.rows().count(), 0);
    }

    #[test]
    fn text_rows_are_numbered_and_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.csv");
        std::fs::write(&path, b"\xEF\xBB\xBFCodigo,Nombre\r\n123456789,Paracetamol\r\n").unwrap();

        let src = TabularSource::open(&path, None).unwrap();
        assert_eq!(src.format(), SourceFormat::Delimited);
        let rows: Vec<_> = src.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], RawRow::line(1, "Codigo,Nombre"));
        assert_eq!(rows[1].line, 2);
        assert_eq!(src.rows().count(), 2);
    }

    #[test]
    fn latin1_file_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.csv");
        std::fs::write(&path, b"C\xF3digo,Nombre\n").unwrap();
        let src = TabularSource::open(&path, None).unwrap();
        let first = src.rows().next().unwrap();
        assert_eq!(first, RawRow::line(1, "Código,Nombre"));
    }
}
