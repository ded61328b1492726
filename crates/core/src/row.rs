// Raw rows as produced by a tabular source

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which reader produced a row. Selects the classifier variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Delimited text (tab or comma), one physical line per row.
    Delimited,
    /// Spreadsheet workbook (xlsx, xls, xlsb, ods), rows arrive pre-split.
    Spreadsheet,
}

impl SourceFormat {
    /// Guess the format from a file extension. Unknown extensions are text.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Self::Spreadsheet,
            _ => Self::Delimited,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delimited => write!(f, "delimited"),
            Self::Spreadsheet => write!(f, "spreadsheet"),
        }
    }
}

/// A typed spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Int(i64),
    Bool(bool),
}

impl Cell {
    /// Render the cell as text. Whole floats print without decimals so that a
    /// numeric product code like `123456789.0` reads back as `123456789`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Cell::Int(n) => n.to_string(),
            Cell::Bool(true) => "TRUE".to_string(),
            Cell::Bool(false) => "FALSE".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// Row content: an unsplit text line, or cells already split into columns.
#[derive(Debug, Clone, PartialEq)]
pub enum RowPayload {
    Line(String),
    Cells(Vec<Cell>),
}

/// One row of a tabular source. `line` is 1-based and refers to the physical
/// line (text) or worksheet row (spreadsheet) in the original file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub line: usize,
    pub format: SourceFormat,
    pub payload: RowPayload,
}

impl RawRow {
    pub fn line(line: usize, text: impl Into<String>) -> Self {
        Self {
            line,
            format: SourceFormat::Delimited,
            payload: RowPayload::Line(text.into()),
        }
    }

    pub fn cells(line: usize, cells: Vec<Cell>) -> Self {
        Self {
            line,
            format: SourceFormat::Spreadsheet,
            payload: RowPayload::Cells(cells),
        }
    }
}

/// Whether the source file was there at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Found,
    NotFound,
}

/// A finite, restartable sequence of raw rows.
///
/// Every call to [`RowSource::rows`] starts again from the first row.
pub trait RowSource {
    fn format(&self) -> SourceFormat;

    fn status(&self) -> SourceStatus;

    fn rows(&self) -> Box<dyn Iterator<Item = RawRow> + '_>;
}

/// In-memory source, used by tests and by callers that already hold the rows.
impl RowSource for Vec<RawRow> {
    fn format(&self) -> SourceFormat {
        self.first().map(|r| r.format).unwrap_or(SourceFormat::Delimited)
    }

    fn status(&self) -> SourceStatus {
        SourceStatus::Found
    }

    fn rows(&self) -> Box<dyn Iterator<Item = RawRow> + '_> {
        Box::new(self.iter().cloned())
    }
}
