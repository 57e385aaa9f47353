use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::range::DateRange;
use crate::domain::records::{
    DailyTrendRecord, LinkTypeRecord, OrderRecord, OrderedItem, TrackingSummary,
};

/// Typed tables produced by ingestion, before they are sealed into a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetTables {
    pub earnings: Vec<OrderRecord>,
    pub orders: Vec<OrderedItem>,
    pub daily_trends: Vec<DailyTrendRecord>,
    pub tracking: Vec<TrackingSummary>,
    pub link_types: Vec<LinkTypeRecord>,
}

/// Immutable snapshot of one uploaded export.
///
/// The checksum is a sha256 over the canonical JSON encoding of the tables and
/// the reported range. Classifier artifacts record it to prove which snapshot
/// they were trained on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDataset {
    tables: DatasetTables,
    reported_range: DateRange,
    checksum: String,
}

impl CanonicalDataset {
    pub fn seal(tables: DatasetTables, reported_range: DateRange) -> Result<Self, serde_json::Error> {
        let checksum = content_checksum(&tables, &reported_range)?;
        Ok(Self { tables, reported_range, checksum })
    }

    pub fn earnings(&self) -> &[OrderRecord] {
        &self.tables.earnings
    }

    pub fn orders(&self) -> &[OrderedItem] {
        &self.tables.orders
    }

    pub fn daily_trends(&self) -> &[DailyTrendRecord] {
        &self.tables.daily_trends
    }

    pub fn tracking(&self) -> &[TrackingSummary] {
        &self.tables.tracking
    }

    pub fn link_types(&self) -> &[LinkTypeRecord] {
        &self.tables.link_types
    }

    /// Range printed in the export title row.
    pub fn reported_range(&self) -> DateRange {
        self.reported_range
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Earliest and latest date present in any dated table.
    pub fn observed_range(&self) -> Option<DateRange> {
        let earnings = self.tables.earnings.iter().map(|row| row.date_shipped);
        let orders = self.tables.orders.iter().map(|row| row.date);
        let trends = self.tables.daily_trends.iter().map(|row| row.date);
        DateRange::spanning(earnings.chain(orders).chain(trends))
    }

    pub fn total_revenue(&self) -> Decimal {
        self.tables.earnings.iter().map(|row| row.revenue).sum()
    }

    /// Recomputes the checksum from content; differs from `checksum()` only if
    /// the serialized form was altered after sealing.
    pub fn recompute_checksum(&self) -> Result<String, serde_json::Error> {
        content_checksum(&self.tables, &self.reported_range)
    }
}

fn content_checksum(
    tables: &DatasetTables,
    reported_range: &DateRange,
) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_vec(&(tables, reported_range))?;
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Ok(hex::encode(hasher.finalize()))
}
