use std::collections::BTreeMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::errors::IngestError;

/// Untyped cell as decoded from the workbook.
#[derive(Clone, Debug, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Error(String),
}

impl RawCell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(value) => value.trim().is_empty(),
            _ => false,
        }
    }

    /// Cell content rendered for error messages and title scanning.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(value) => value.clone(),
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                format!("{}", *value as i64)
            }
            Self::Number(value) => value.to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Error(value) => format!("#{value}"),
        }
    }
}

pub type RawRow = Vec<RawCell>;

#[derive(Clone, Debug, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<RawRow>,
}

/// In-memory workbook keyed by normalized sheet name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawWorkbook {
    sheets: BTreeMap<String, RawSheet>,
}

impl RawWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes xlsx, xlsm, xlsb, xls or ods bytes.
    pub fn from_bytes(raw_bytes: &[u8]) -> Result<Self, IngestError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(raw_bytes.to_vec()))
            .map_err(|error| IngestError::Workbook(error.to_string()))?;

        let mut decoded = Self::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|error| IngestError::Workbook(format!("sheet `{name}`: {error}")))?;

            // calamine trims leading empty rows and columns; restore absolute positions
            let (row_offset, col_offset) = range
                .start()
                .map(|(row, col)| (row as usize, col as usize))
                .unwrap_or((0, 0));
            let mut rows: Vec<RawRow> = vec![Vec::new(); row_offset];
            for row in range.rows() {
                let mut cells = vec![RawCell::Empty; col_offset];
                cells.extend(row.iter().map(convert_cell));
                rows.push(cells);
            }

            decoded.insert(RawSheet { name, rows });
        }

        Ok(decoded)
    }

    pub fn insert(&mut self, sheet: RawSheet) {
        self.sheets.insert(normalize_sheet_name(&sheet.name), sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&RawSheet> {
        self.sheets.get(&normalize_sheet_name(name))
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.values().map(|sheet| sheet.name.as_str())
    }
}

fn convert_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(value) => RawCell::Text(value.clone()),
        Data::Float(value) => RawCell::Number(*value),
        Data::Int(value) => RawCell::Number(*value as f64),
        Data::Bool(value) => RawCell::Bool(*value),
        Data::DateTime(value) => RawCell::Number(value.as_f64()),
        Data::DateTimeIso(value) | Data::DurationIso(value) => RawCell::Text(value.clone()),
        Data::Error(error) => RawCell::Error(format!("{error:?}")),
    }
}

/// `Fee-Orders`, `fee_orders` and `FEE ORDERS` all name the same sheet.
pub fn normalize_sheet_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|ch| if ch == '-' || ch == ' ' { '_' } else { ch.to_ascii_lowercase() })
        .collect()
}
