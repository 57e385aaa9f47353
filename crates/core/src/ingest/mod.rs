//! Spreadsheet ingestion.
//!
//! Turns the five-sheet affiliate export into a sealed [`CanonicalDataset`].
//! Every sheet starts with a title row; the real header follows it. Cells are
//! cast to typed values at this boundary so downstream code never sees raw
//! spreadsheet content.

pub mod cells;
pub mod sheets;
pub mod workbook;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::records::UNKNOWN_ATTRIBUTE;
use crate::domain::{
    CanonicalDataset, DailyTrendRecord, DatasetTables, DateRange, LinkTypeRecord, OrderRecord,
    OrderedItem, ProductId, TrackingSummary,
};
use crate::errors::IngestError;
use crate::ingest::sheets::{SheetKind, SheetTable};
use crate::ingest::workbook::{normalize_sheet_name, RawSheet, RawWorkbook};

pub use workbook::{RawCell, RawRow};

type OrderKey = (ProductId, String, NaiveDate);
type ProductTrackingKey = (ProductId, String);

#[derive(Clone, Debug, Default)]
pub struct SpreadsheetIngestor;

impl SpreadsheetIngestor {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw_bytes: &[u8]) -> Result<CanonicalDataset, IngestError> {
        let workbook = RawWorkbook::from_bytes(raw_bytes)?;
        self.ingest_workbook(&workbook)
    }

    pub fn ingest_workbook(&self, workbook: &RawWorkbook) -> Result<CanonicalDataset, IngestError> {
        let mut located: Vec<(SheetKind, &RawSheet)> = Vec::with_capacity(SheetKind::ALL.len());
        for kind in SheetKind::ALL {
            let sheet = workbook
                .sheet(kind.sheet_name())
                .ok_or_else(|| IngestError::MissingSheet { sheet: kind.sheet_name().to_string() })?;
            located.push((kind, sheet));
        }
        for name in workbook.sheet_names() {
            let known = SheetKind::ALL
                .iter()
                .any(|kind| normalize_sheet_name(kind.sheet_name()) == normalize_sheet_name(name));
            if !known {
                debug!(event_name = "ingest.sheet_ignored", sheet = name, "ignoring extra sheet");
            }
        }

        let reported_range = reported_range(&located)?;

        let mut tables = DatasetTables::default();
        let mut earnings_rows = Vec::new();
        let mut order_rows = Vec::new();
        for (kind, sheet) in &located {
            let table = SheetTable::locate(*kind, sheet)?;
            match kind {
                SheetKind::Earnings => earnings_rows = read_earnings(&table)?,
                SheetKind::Orders => order_rows = read_orders(&table)?,
                SheetKind::DailyTrends => tables.daily_trends = read_daily_trends(&table)?,
                SheetKind::Tracking => tables.tracking = read_tracking(&table)?,
                SheetKind::LinkType => tables.link_types = read_link_types(&table)?,
            }
        }

        let source_earnings = earnings_rows.len();
        let source_orders = order_rows.len();
        let (earnings, orders) = merge(earnings_rows, order_rows);
        tables.earnings = earnings;
        tables.orders = orders;

        let dataset = CanonicalDataset::seal(tables, reported_range).map_err(|error| {
            IngestError::Workbook(format!("could not fingerprint dataset: {error}"))
        })?;

        info!(
            event_name = "ingest.completed",
            checksum = dataset.checksum(),
            reported_range = %dataset.reported_range(),
            earnings_rows = dataset.earnings().len(),
            merged_earnings_rows = source_earnings - dataset.earnings().len(),
            order_rows = dataset.orders().len(),
            merged_order_rows = source_orders - dataset.orders().len(),
            daily_trend_rows = dataset.daily_trends().len(),
            tracking_rows = dataset.tracking().len(),
            link_type_rows = dataset.link_types().len(),
            "spreadsheet ingested"
        );

        Ok(dataset)
    }
}

/// Reads the `MM-DD-YYYY ... MM-DD-YYYY` window from the first title row that
/// carries one, checking the earnings sheet first.
fn reported_range(located: &[(SheetKind, &RawSheet)]) -> Result<DateRange, IngestError> {
    for (kind, sheet) in located {
        let title = title_text(sheet);
        let tokens = date_tokens(&title);
        if tokens.len() < 2 {
            continue;
        }

        let invalid = || IngestError::DateFormat {
            sheet: kind.sheet_name().to_string(),
            row: 1,
            value: title.clone(),
        };
        let from = NaiveDate::parse_from_str(tokens[0], "%m-%d-%Y").map_err(|_| invalid())?;
        let to = NaiveDate::parse_from_str(tokens[1], "%m-%d-%Y").map_err(|_| invalid())?;
        return DateRange::new(from, to).map_err(|_| invalid());
    }

    Err(IngestError::DateFormat {
        sheet: SheetKind::Earnings.sheet_name().to_string(),
        row: 1,
        value: located.first().map(|(_, sheet)| title_text(sheet)).unwrap_or_default(),
    })
}

fn title_text(sheet: &RawSheet) -> String {
    sheet
        .rows
        .first()
        .map(|row| {
            row.iter()
                .filter(|cell| !cell.is_blank())
                .map(RawCell::display)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Substrings shaped like `MM-DD-YYYY`, in order of appearance.
fn date_tokens(text: &str) -> Vec<&str> {
    const SHAPE: &[u8; 10] = b"00-00-0000";
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;

    while start + SHAPE.len() <= bytes.len() {
        let window = &bytes[start..start + SHAPE.len()];
        let shaped = window.iter().zip(SHAPE).all(|(byte, expected)| match expected {
            b'0' => byte.is_ascii_digit(),
            other => byte == other,
        });
        let bounded = start == 0 || !bytes[start - 1].is_ascii_digit();
        let closed = bytes.get(start + SHAPE.len()).map_or(true, |next| !next.is_ascii_digit());

        if shaped && bounded && closed {
            tokens.push(&text[start..start + SHAPE.len()]);
            start += SHAPE.len();
        } else {
            start += 1;
        }
    }

    tokens
}

fn read_earnings(table: &SheetTable<'_>) -> Result<Vec<OrderRecord>, IngestError> {
    table
        .rows()
        .iter()
        .map(|row| {
            let items_shipped = row.count("items_shipped")?;
            let returns = row.count("returns")?;
            if returns > items_shipped {
                return Err(row.malformed(
                    "returns",
                    format!("returns {returns} exceed items shipped {items_shipped}"),
                ));
            }

            Ok(OrderRecord {
                category: row.text("category"),
                name: row.text("name"),
                product_id: ProductId(row.required_text("product_id")?),
                seller: non_blank(row.text("seller")),
                tracking_id: row.text("tracking_id"),
                date_shipped: row.date("date_shipped")?,
                price: row.money("price")?,
                items_shipped,
                returns,
                revenue: row.money("revenue")?,
                ad_fees: row.money("ad_fees")?,
                device_type: non_blank(row.text("device_type")),
                link_type: UNKNOWN_ATTRIBUTE.to_string(),
                direct_sale: false,
            })
        })
        .collect()
}

fn read_orders(table: &SheetTable<'_>) -> Result<Vec<OrderedItem>, IngestError> {
    table
        .rows()
        .iter()
        .map(|row| {
            Ok(OrderedItem {
                category: row.text("category"),
                name: row.text("name"),
                product_id: ProductId(row.required_text("product_id")?),
                seller: non_blank(row.text("seller")),
                tracking_id: row.text("tracking_id"),
                date: row.date("date")?,
                price: row.money("price")?,
                quantity: row.count("quantity")?,
                link_type: non_blank(row.text("link_type")),
                direct_sale: row.flag("direct_sale")?,
                device_type: UNKNOWN_ATTRIBUTE.to_string(),
            })
        })
        .collect()
}

fn read_daily_trends(table: &SheetTable<'_>) -> Result<Vec<DailyTrendRecord>, IngestError> {
    let mut trends = table
        .rows()
        .iter()
        .map(|row| {
            Ok(DailyTrendRecord {
                date: row.date("date")?,
                clicks: row.count("clicks")?,
                items_ordered_amazon: row.count("items_ordered_amazon")?,
                items_ordered_third_party: row.count("items_ordered_third_party")?,
                total_items_ordered: row.count("total_items_ordered")?,
                conversion: row.rate("conversion")?,
            })
        })
        .collect::<Result<Vec<_>, IngestError>>()?;
    trends.sort_by_key(|trend| trend.date);
    Ok(trends)
}

fn read_tracking(table: &SheetTable<'_>) -> Result<Vec<TrackingSummary>, IngestError> {
    table
        .rows()
        .iter()
        .map(|row| {
            Ok(TrackingSummary {
                tracking_id: row.required_text("tracking_id")?,
                clicks: row.count("clicks")?,
                items_ordered: row.count("items_ordered")?,
                items_shipped: row.count("items_shipped")?,
                revenue: row.money("revenue")?,
                ad_fees: row.money("ad_fees")?,
            })
        })
        .collect()
}

fn read_link_types(table: &SheetTable<'_>) -> Result<Vec<LinkTypeRecord>, IngestError> {
    table
        .rows()
        .iter()
        .map(|row| {
            Ok(LinkTypeRecord {
                link_type: row.required_text("link_type")?,
                clicks: row.count("clicks")?,
                items_ordered: row.count("items_ordered")?,
                conversion: row.rate("conversion")?,
                ordered_revenue: row.money("ordered_revenue")?,
                items_shipped: row.count("items_shipped")?,
                ad_fees: row.money("ad_fees")?,
            })
        })
        .collect()
}

fn non_blank(value: String) -> String {
    if value.is_empty() {
        UNKNOWN_ATTRIBUTE.to_string()
    } else {
        value
    }
}

/// Collapses duplicate keys by summing and cross-attributes link type, direct
/// sale, category and device between the earnings and orders tables.
fn merge(
    earnings_rows: Vec<OrderRecord>,
    order_rows: Vec<OrderedItem>,
) -> (Vec<OrderRecord>, Vec<OrderedItem>) {
    let mut earnings: BTreeMap<OrderKey, OrderRecord> = BTreeMap::new();
    for row in earnings_rows {
        let key = (row.product_id.clone(), row.tracking_id.clone(), row.date_shipped);
        match earnings.get_mut(&key) {
            Some(existing) => {
                existing.items_shipped = existing.items_shipped.saturating_add(row.items_shipped);
                existing.returns = existing.returns.saturating_add(row.returns);
                existing.revenue += row.revenue;
                existing.ad_fees += row.ad_fees;
            }
            None => {
                earnings.insert(key, row);
            }
        }
    }

    let mut orders: BTreeMap<OrderKey, OrderedItem> = BTreeMap::new();
    for row in order_rows {
        let key = (row.product_id.clone(), row.tracking_id.clone(), row.date);
        match orders.get_mut(&key) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(row.quantity),
            None => {
                orders.insert(key, row);
            }
        }
    }

    // first row per product and tracking id, in key order so the earliest date wins
    let mut earnings_fallback: BTreeMap<ProductTrackingKey, (String, String)> = BTreeMap::new();
    for ((product_id, tracking_id, _), row) in &earnings {
        earnings_fallback
            .entry((product_id.clone(), tracking_id.clone()))
            .or_insert_with(|| (row.category.clone(), row.device_type.clone()));
    }
    let mut orders_fallback: BTreeMap<ProductTrackingKey, (String, bool)> = BTreeMap::new();
    for ((product_id, tracking_id, _), row) in &orders {
        orders_fallback
            .entry((product_id.clone(), tracking_id.clone()))
            .or_insert_with(|| (row.link_type.clone(), row.direct_sale));
    }

    let mut merged_orders: Vec<OrderedItem> = Vec::with_capacity(orders.len());
    for (key, row) in &orders {
        let mut row = row.clone();
        let attribution = earnings
            .get(key)
            .map(|earning| (earning.category.clone(), earning.device_type.clone()))
            .or_else(|| earnings_fallback.get(&(key.0.clone(), key.1.clone())).cloned());
        if let Some((category, device_type)) = attribution {
            if row.category.is_empty() {
                row.category = category;
            }
            row.device_type = device_type;
        }
        merged_orders.push(row);
    }

    let mut merged_earnings: Vec<OrderRecord> = Vec::with_capacity(earnings.len());
    for (key, mut row) in earnings {
        let attribution = orders
            .get(&key)
            .map(|order| (order.link_type.clone(), order.direct_sale))
            .or_else(|| orders_fallback.get(&(key.0.clone(), key.1.clone())).cloned());
        if let Some((link_type, direct_sale)) = attribution {
            row.link_type = link_type;
            row.direct_sale = direct_sale;
        }
        merged_earnings.push(row);
    }

    merged_earnings.sort_by(|a, b| {
        (a.date_shipped, &a.product_id, &a.tracking_id).cmp(&(b.date_shipped, &b.product_id, &b.tracking_id))
    });
    merged_orders
        .sort_by(|a, b| (a.date, &a.product_id, &a.tracking_id).cmp(&(b.date, &b.product_id, &b.tracking_id)));

    (merged_earnings, merged_orders)
}
