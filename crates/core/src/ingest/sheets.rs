use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::errors::IngestError;
use crate::ingest::cells;
use crate::ingest::workbook::{RawCell, RawRow, RawSheet};

/// Rows after the title row that may hold the header.
pub const HEADER_SEARCH_ROWS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SheetKind {
    Tracking,
    DailyTrends,
    Orders,
    LinkType,
    Earnings,
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnSpec {
    pub id: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

const fn required(id: &'static str, aliases: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec { id, aliases, required: true }
}

const fn optional(id: &'static str, aliases: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec { id, aliases, required: false }
}

const TRACKING_COLUMNS: &[ColumnSpec] = &[
    required("tracking_id", &["Tracking ID", "Tracking Id", "Tracking"]),
    required("clicks", &["Clicks"]),
    required("items_ordered", &["Items Ordered"]),
    required("items_shipped", &["Items Shipped"]),
    required("revenue", &["Revenue($)", "Revenue"]),
    required("ad_fees", &["Ad Fees($)", "Ad Fees"]),
];

const DAILY_TREND_COLUMNS: &[ColumnSpec] = &[
    required("date", &["Date"]),
    required("clicks", &["Clicks"]),
    optional("items_ordered_amazon", &["Items Ordered (Amazon)", "Amazon Items Ordered"]),
    optional(
        "items_ordered_third_party",
        &["Items Ordered (3rd Party)", "3rd Party Items Ordered", "Third Party Items Ordered"],
    ),
    required("total_items_ordered", &["Total Items Ordered"]),
    optional("conversion", &["Conversion", "Conversion Rate"]),
];

const ORDER_COLUMNS: &[ColumnSpec] = &[
    optional("category", &["Category"]),
    required("name", &["Name", "Product Name"]),
    required("product_id", &["ASIN", "Product ID"]),
    optional("seller", &["Seller", "Seller Type"]),
    required("tracking_id", &["Tracking ID", "Tracking Id"]),
    required("date", &["Date", "Order Date"]),
    optional("price", &["Price($)", "Price"]),
    required("quantity", &["Qty", "Quantity", "Items Ordered"]),
    optional("link_type", &["Link Type"]),
    optional("direct_sale", &["Direct Sale", "Direct/Indirect Sale", "Indirect Sales"]),
];

const LINK_TYPE_COLUMNS: &[ColumnSpec] = &[
    required("link_type", &["Link Type"]),
    required("clicks", &["Clicks"]),
    required("items_ordered", &["Items Ordered"]),
    optional("conversion", &["Conversion"]),
    required("ordered_revenue", &["Ordered Revenue($)", "Ordered Revenue"]),
    required("items_shipped", &["Items Shipped"]),
    required("ad_fees", &["Ad Fees($)", "Ad Fees"]),
];

const EARNINGS_COLUMNS: &[ColumnSpec] = &[
    optional("category", &["Category"]),
    required("name", &["Name", "Product Name"]),
    required("product_id", &["ASIN", "Product ID"]),
    optional("seller", &["Seller", "Seller Type"]),
    required("tracking_id", &["Tracking ID", "Tracking Id"]),
    required("date_shipped", &["Date Shipped"]),
    required("price", &["Price($)", "Price"]),
    required("items_shipped", &["Items Shipped"]),
    required("returns", &["Returns"]),
    required("revenue", &["Revenue($)", "Revenue"]),
    required("ad_fees", &["Ad Fees($)", "Ad Fees"]),
    optional("device_type", &["Device Type Group", "Device Type"]),
];

impl SheetKind {
    /// Validation order; earnings first because it also carries the date range.
    pub const ALL: [SheetKind; 5] =
        [Self::Earnings, Self::Orders, Self::DailyTrends, Self::Tracking, Self::LinkType];

    pub fn sheet_name(self) -> &'static str {
        match self {
            Self::Tracking => "Fee-Tracking",
            Self::DailyTrends => "Fee-DailyTrends",
            Self::Orders => "Fee-Orders",
            Self::LinkType => "Fee-LinkType",
            Self::Earnings => "Fee-Earnings",
        }
    }

    pub fn columns(self) -> &'static [ColumnSpec] {
        match self {
            Self::Tracking => TRACKING_COLUMNS,
            Self::DailyTrends => DAILY_TREND_COLUMNS,
            Self::Orders => ORDER_COLUMNS,
            Self::LinkType => LINK_TYPE_COLUMNS,
            Self::Earnings => EARNINGS_COLUMNS,
        }
    }

    /// A data row with all of these blank is a trailing totals row and ends the table.
    fn key_columns(self) -> &'static [&'static str] {
        match self {
            Self::Tracking => &["tracking_id"],
            Self::DailyTrends => &["date"],
            Self::Orders => &["product_id", "date"],
            Self::LinkType => &["link_type"],
            Self::Earnings => &["product_id", "date_shipped"],
        }
    }
}

/// Lowercase alphanumerics only, so `Ad Fees($)` and `ad fees` compare equal.
pub fn normalize_header(label: &str) -> String {
    label.chars().filter(char::is_ascii_alphanumeric).map(|ch| ch.to_ascii_lowercase()).collect()
}

/// A sheet with its header resolved to column positions.
#[derive(Debug)]
pub struct SheetTable<'a> {
    kind: SheetKind,
    sheet: &'a RawSheet,
    header_row: usize,
    positions: HashMap<&'static str, usize>,
}

impl<'a> SheetTable<'a> {
    pub fn locate(kind: SheetKind, sheet: &'a RawSheet) -> Result<Self, IngestError> {
        let last = sheet.rows.len().min(1 + HEADER_SEARCH_ROWS);
        let mut first_missing: Option<&'static str> = None;

        for index in 1..last {
            let labels: HashMap<String, usize> = sheet.rows[index]
                .iter()
                .enumerate()
                .filter(|(_, cell)| !cell.is_blank())
                .map(|(position, cell)| (normalize_header(&cell.display()), position))
                .collect();

            let mut positions = HashMap::new();
            let mut missing = None;
            for column in kind.columns() {
                let found = column
                    .aliases
                    .iter()
                    .find_map(|alias| labels.get(&normalize_header(alias)).copied());
                match found {
                    Some(position) => {
                        positions.insert(column.id, position);
                    }
                    None if column.required && missing.is_none() => missing = Some(column.aliases[0]),
                    None => {}
                }
            }

            match missing {
                None => return Ok(Self { kind, sheet, header_row: index, positions }),
                Some(name) if index == 1 => first_missing = Some(name),
                Some(_) => {}
            }
        }

        let missing = first_missing
            .or_else(|| kind.columns().iter().find(|column| column.required).map(|c| c.aliases[0]))
            .unwrap_or_default();
        Err(IngestError::MalformedHeader {
            sheet: kind.sheet_name().to_string(),
            row: 2,
            missing: missing.to_string(),
        })
    }

    /// Zero-based index of the header row.
    pub fn header_row(&self) -> usize {
        self.header_row
    }

    /// Data rows below the header, skipping blank rows and stopping at a totals row.
    pub fn rows(&self) -> Vec<TableRow<'_>> {
        let mut rows = Vec::new();
        for (index, cells) in self.sheet.rows.iter().enumerate().skip(self.header_row + 1) {
            if cells.iter().all(RawCell::is_blank) {
                continue;
            }
            let row = TableRow { table: self, index, cells };
            if self.kind.key_columns().iter().all(|id| row.raw(id).is_blank()) {
                break;
            }
            rows.push(row);
        }
        rows
    }
}

#[derive(Debug)]
pub struct TableRow<'a> {
    table: &'a SheetTable<'a>,
    index: usize,
    cells: &'a RawRow,
}

static EMPTY_CELL: RawCell = RawCell::Empty;

impl<'a> TableRow<'a> {
    /// One-based row number as shown by spreadsheet software.
    pub fn row_number(&self) -> usize {
        self.index + 1
    }

    fn raw(&self, id: &str) -> &RawCell {
        self.table
            .positions
            .get(id)
            .and_then(|position| self.cells.get(*position))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn malformed(&self, id: &str, reason: impl Into<String>) -> IngestError {
        let column = self
            .table
            .kind
            .columns()
            .iter()
            .find(|column| column.id == id)
            .map(|column| column.aliases[0])
            .unwrap_or(id);
        IngestError::MalformedCell {
            sheet: self.table.kind.sheet_name().to_string(),
            row: self.row_number(),
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    pub fn text(&self, id: &str) -> String {
        cells::text(self.raw(id))
    }

    pub fn required_text(&self, id: &str) -> Result<String, IngestError> {
        let value = self.text(id);
        if value.is_empty() {
            return Err(self.malformed(id, "value is blank"));
        }
        Ok(value)
    }

    pub fn date(&self, id: &str) -> Result<NaiveDate, IngestError> {
        cells::date(self.raw(id)).map_err(|reason| self.malformed(id, reason))
    }

    pub fn money(&self, id: &str) -> Result<Decimal, IngestError> {
        cells::money(self.raw(id)).map_err(|reason| self.malformed(id, reason))
    }

    pub fn count(&self, id: &str) -> Result<u32, IngestError> {
        cells::count(self.raw(id)).map_err(|reason| self.malformed(id, reason))
    }

    pub fn rate(&self, id: &str) -> Result<f64, IngestError> {
        cells::rate(self.raw(id)).map_err(|reason| self.malformed(id, reason))
    }

    pub fn flag(&self, id: &str) -> Result<bool, IngestError> {
        cells::flag(self.raw(id)).map_err(|reason| self.malformed(id, reason))
    }
}
