//! Raw cell grid loaded from a spreadsheet export. No interpretation happens
//! here beyond recognising which text cells hold amounts.

use crate::error::{PnlError, Result};
use crate::schema::ValidationWarning;
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MIN_ROWS: usize = 10;
const MIN_COLS: usize = 2;
const MAX_EMPTY_SHARE: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Builds a cell from raw text, recognising amounts such as `1,234.50`,
    /// `(250.00)` or `$1,000`.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match parse_amount(trimmed) {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::from_text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Parses an accounting-formatted amount. Parentheses and a trailing minus
/// both mean negative; currency symbols and thousands separators are ignored.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    let mut negative = false;

    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = &s[1..s.len() - 1];
    }
    if let Some(rest) = s.strip_suffix('-') {
        negative = !negative;
        s = rest;
    }
    s = s.trim();
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.trim_start();
    }

    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '£' | '€' | '¥' | ' ' | '\u{a0}'))
        .collect();

    if cleaned.is_empty()
        || !cleaned.chars().any(|c| c.is_ascii_digit())
        || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Ordered rows of typed cells. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellGrid {
    rows: Vec<Vec<CellValue>>,
}

impl CellGrid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Convenience constructor interpreting every cell as text.
    pub fn from_text_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|c| CellValue::from_text(c.as_ref())).collect())
                .collect(),
        }
    }

    /// Loads the first worksheet of a workbook, or a CSV export.
    pub fn load(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let grid = match extension.as_str() {
            "csv" => Self::load_csv(path)?,
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Self::load_workbook(path)?,
            other => {
                return Err(unreadable(
                    path,
                    format!("unsupported file type '.{}' (expected csv, xlsx, xls or ods)", other),
                ))
            }
        };

        info!(
            "Loaded {} rows x {} columns from {}",
            grid.row_count(),
            grid.column_count(),
            path.display()
        );
        Ok(grid)
    }

    fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| unreadable(path, e.to_string()))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| unreadable(path, e.to_string()))?;
            rows.push(record.iter().map(CellValue::from_text).collect());
        }
        Ok(Self { rows })
    }

    fn load_workbook(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(path, e.to_string()))?;
        let first_sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| unreadable(path, "workbook contains no sheets".to_string()))?;

        debug!("Reading worksheet '{}'", first_sheet);
        let range = workbook
            .worksheet_range(&first_sheet)
            .map_err(|e| unreadable(path, e.to_string()))?;

        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(CellValue::is_empty))
    }

    /// All text cells of a row joined by single spaces.
    pub fn row_text(&self, index: usize) -> String {
        self.row(index)
            .map(|cells| {
                cells
                    .iter()
                    .filter_map(|c| match c {
                        CellValue::Text(s) => Some(s.clone()),
                        CellValue::Number(n) => Some(n.to_string()),
                        CellValue::Empty => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    /// Structural findings that do not stop a parse: a tiny sheet, a sheet
    /// that is mostly blank, or one without any numbers.
    pub fn diagnose(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let rows = self.row_count();
        let cols = self.column_count();

        if rows < MIN_ROWS {
            warnings.push(ValidationWarning::GridStructure {
                detail: format!("sheet has only {} rows; at least {} expected", rows, MIN_ROWS),
            });
        }
        if cols < MIN_COLS {
            warnings.push(ValidationWarning::GridStructure {
                detail: format!(
                    "sheet has only {} columns; at least {} expected",
                    cols, MIN_COLS
                ),
            });
        }

        let total_cells = rows * cols;
        if total_cells > 0 {
            let filled: usize = self
                .rows
                .iter()
                .map(|r| r.iter().filter(|c| !c.is_empty()).count())
                .sum();
            let empty_share = 1.0 - filled as f64 / total_cells as f64;
            if empty_share > MAX_EMPTY_SHARE {
                warnings.push(ValidationWarning::GridStructure {
                    detail: format!("{:.1}% of cells are empty", empty_share * 100.0),
                });
            }
        }

        let has_numbers = self
            .rows
            .iter()
            .any(|r| r.iter().any(|c| c.as_number().is_some()));
        if rows > 0 && !has_numbers {
            warnings.push(ValidationWarning::GridStructure {
                detail: "sheet contains no numeric values".to_string(),
            });
        }

        warnings
    }
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::String(s) => CellValue::from_text(s),
        other => {
            let text = other.to_string();
            if text.trim().is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(text.trim().to_string())
            }
        }
    }
}

fn unreadable(path: &Path, reason: String) -> PnlError {
    PnlError::UnreadableFile {
        path: path.display().to_string(),
        reason,
    }
}
