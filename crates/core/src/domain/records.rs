use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_ATTRIBUTE: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One shipped line from the earnings sheet, with order attribution merged in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub category: String,
    pub name: String,
    pub product_id: ProductId,
    pub seller: String,
    pub tracking_id: String,
    pub date_shipped: NaiveDate,
    pub price: Decimal,
    pub items_shipped: u32,
    pub returns: u32,
    pub revenue: Decimal,
    pub ad_fees: Decimal,
    pub device_type: String,
    pub link_type: String,
    pub direct_sale: bool,
}

impl OrderRecord {
    pub fn was_returned(&self) -> bool {
        self.returns > 0
    }

    /// Value of the returned units at list price.
    pub fn revenue_lost(&self) -> Decimal {
        self.price * Decimal::from(self.returns)
    }

    pub fn short_category(&self) -> &str {
        short_category(&self.category)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub category: String,
    pub name: String,
    pub product_id: ProductId,
    pub seller: String,
    pub tracking_id: String,
    pub date: NaiveDate,
    pub price: Decimal,
    pub quantity: u32,
    pub link_type: String,
    pub direct_sale: bool,
    pub device_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyTrendRecord {
    pub date: NaiveDate,
    pub clicks: u32,
    pub items_ordered_amazon: u32,
    pub items_ordered_third_party: u32,
    pub total_items_ordered: u32,
    /// Conversion as exported, expressed as a fraction.
    pub conversion: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSummary {
    pub tracking_id: String,
    pub clicks: u32,
    pub items_ordered: u32,
    pub items_shipped: u32,
    pub revenue: Decimal,
    pub ad_fees: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkTypeRecord {
    pub link_type: String,
    pub clicks: u32,
    pub items_ordered: u32,
    pub conversion: f64,
    pub ordered_revenue: Decimal,
    pub items_shipped: u32,
    pub ad_fees: Decimal,
}

/// First word of a marketplace category path, e.g. `Electronics` for `Electronics > Audio`.
pub fn short_category(category: &str) -> &str {
    category.split_whitespace().next().unwrap_or(UNKNOWN_ATTRIBUTE)
}
