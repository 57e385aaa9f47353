use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsEngine;
use crate::domain::{CanonicalDataset, DateRange, OrderRecord, OrderedItem, ProductId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    /// Ad fees earned, from the earnings table.
    AdFees,
    /// Units ordered, from the orders table.
    Quantity,
}

impl FromStr for RankBy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "ad-fees" | "fees" => Ok(Self::AdFees),
            "quantity" | "qty" => Ok(Self::Quantity),
            other => Err(format!("unknown ranking `{other}`; expected ad-fees or quantity")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRanking {
    pub product_id: ProductId,
    pub name: String,
    pub ad_fees: Decimal,
    pub quantity: u64,
}

/// One zero-filled point on the main dashboard chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardDay {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub ad_fees: Decimal,
    pub clicks: u64,
    pub items_ordered: u64,
}

impl AnalyticsEngine {
    /// Top `n` products by `rank_by`, descending, ties broken by product id.
    ///
    /// Each entry carries both measures; the one not ranked on is filled from
    /// the other table when the product appears there in the same range.
    pub fn compute_top_products(
        &self,
        earnings: &[OrderRecord],
        items: &[OrderedItem],
        range: DateRange,
        n: usize,
        rank_by: RankBy,
    ) -> Vec<ProductRanking> {
        let mut fees: BTreeMap<&ProductId, (&str, Decimal)> = BTreeMap::new();
        for row in earnings.iter().filter(|row| range.contains(row.date_shipped)) {
            fees.entry(&row.product_id).or_insert((row.name.as_str(), Decimal::ZERO)).1 +=
                row.ad_fees;
        }

        let mut quantities: BTreeMap<&ProductId, (&str, u64)> = BTreeMap::new();
        for item in items.iter().filter(|item| range.contains(item.date)) {
            quantities.entry(&item.product_id).or_insert((item.name.as_str(), 0)).1 +=
                u64::from(item.quantity);
        }

        let mut ranked: Vec<ProductRanking> = match rank_by {
            RankBy::AdFees => fees
                .iter()
                .map(|(id, (name, ad_fees))| ProductRanking {
                    product_id: (*id).clone(),
                    name: name.to_string(),
                    ad_fees: *ad_fees,
                    quantity: quantities.get(id).map_or(0, |(_, quantity)| *quantity),
                })
                .collect(),
            RankBy::Quantity => quantities
                .iter()
                .map(|(id, (name, quantity))| ProductRanking {
                    product_id: (*id).clone(),
                    name: name.to_string(),
                    ad_fees: fees.get(id).map_or(Decimal::ZERO, |(_, ad_fees)| *ad_fees),
                    quantity: *quantity,
                })
                .collect(),
        };

        ranked.sort_by(|a, b| {
            let primary = match rank_by {
                RankBy::AdFees => b.ad_fees.cmp(&a.ad_fees),
                RankBy::Quantity => b.quantity.cmp(&a.quantity),
            };
            primary.then_with(|| a.product_id.cmp(&b.product_id))
        });
        ranked.truncate(n);
        ranked
    }

    /// Revenue and ad fees by ship date with clicks and items ordered from the
    /// trends table, one entry per calendar day of `range`.
    pub fn compute_daily_dashboard(
        &self,
        dataset: &CanonicalDataset,
        range: DateRange,
    ) -> Vec<DashboardDay> {
        let mut days: BTreeMap<NaiveDate, DashboardDay> = range
            .days()
            .map(|date| {
                let day = DashboardDay {
                    date,
                    revenue: Decimal::ZERO,
                    ad_fees: Decimal::ZERO,
                    clicks: 0,
                    items_ordered: 0,
                };
                (date, day)
            })
            .collect();

        for row in dataset.earnings() {
            if let Some(day) = days.get_mut(&row.date_shipped) {
                day.revenue += row.revenue;
                day.ad_fees += row.ad_fees;
            }
        }
        for record in dataset.daily_trends() {
            if let Some(day) = days.get_mut(&record.date) {
                day.clicks += u64::from(record.clicks);
                day.items_ordered += u64::from(record.total_items_ordered);
            }
        }

        days.into_values().collect()
    }
}
