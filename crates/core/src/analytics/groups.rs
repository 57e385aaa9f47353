use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analytics::{ratio, AnalyticsEngine, Roi};
use crate::domain::records::short_category;
use crate::domain::{DateRange, LinkTypeRecord, OrderRecord, OrderedItem};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupBreakdown {
    pub key: String,
    pub revenue: Decimal,
    pub ad_fees: Decimal,
    pub order_count: u64,
    pub items_shipped: u64,
    pub returns: u64,
    pub return_rate: f64,
    pub roi: Roi,
}

#[derive(Default)]
struct GroupTotals {
    revenue: Decimal,
    ad_fees: Decimal,
    order_count: u64,
    items_shipped: u64,
    returns: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub rows: u64,
    /// Fraction of all rows in the range.
    pub share: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkTypeRow {
    pub link_type: String,
    pub clicks: u64,
    pub items_ordered: u64,
    pub conversion: f64,
    pub ordered_revenue: Decimal,
    pub items_shipped: u64,
    pub ad_fees: Decimal,
    pub roi: Roi,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkTypeSummary {
    pub rows: Vec<LinkTypeRow>,
    /// Link type with the highest ordered revenue.
    pub best_performer: Option<String>,
}

impl AnalyticsEngine {
    pub fn compute_device_breakdown(
        &self,
        orders: &[OrderRecord],
        range: DateRange,
    ) -> Vec<GroupBreakdown> {
        group_by(orders, range, |row| row.device_type.as_str())
    }

    pub fn compute_link_type_breakdown(
        &self,
        orders: &[OrderRecord],
        range: DateRange,
    ) -> Vec<GroupBreakdown> {
        group_by(orders, range, |row| row.link_type.as_str())
    }

    pub fn compute_seller_breakdown(
        &self,
        orders: &[OrderRecord],
        range: DateRange,
    ) -> Vec<GroupBreakdown> {
        group_by(orders, range, |row| row.seller.as_str())
    }

    /// Ordered rows per short category, largest first.
    pub fn compute_category_distribution(
        &self,
        items: &[OrderedItem],
        range: DateRange,
    ) -> Vec<CategoryShare> {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for item in items.iter().filter(|item| range.contains(item.date)) {
            *counts.entry(short_category(&item.category)).or_insert(0) += 1;
        }

        let total = counts.values().sum();
        let mut shares: Vec<CategoryShare> = counts
            .into_iter()
            .map(|(category, rows)| CategoryShare {
                category: category.to_string(),
                rows,
                share: ratio(rows, total),
            })
            .collect();
        // Stable sort keeps alphabetical order among equal counts.
        shares.sort_by(|a, b| b.rows.cmp(&a.rows));
        shares
    }

    pub fn summarize_link_types(&self, records: &[LinkTypeRecord]) -> LinkTypeSummary {
        let rows: Vec<LinkTypeRow> = records
            .iter()
            .map(|record| LinkTypeRow {
                link_type: record.link_type.clone(),
                clicks: u64::from(record.clicks),
                items_ordered: u64::from(record.items_ordered),
                conversion: record.conversion,
                ordered_revenue: record.ordered_revenue,
                items_shipped: u64::from(record.items_shipped),
                ad_fees: record.ad_fees,
                roi: Roi::from_amounts(record.ordered_revenue, record.ad_fees),
            })
            .collect();

        let best_performer = rows
            .iter()
            .max_by(|a, b| {
                a.ordered_revenue
                    .cmp(&b.ordered_revenue)
                    .then_with(|| b.link_type.cmp(&a.link_type))
            })
            .map(|row| row.link_type.clone());

        LinkTypeSummary { rows, best_performer }
    }
}

fn group_by<'a, F>(orders: &'a [OrderRecord], range: DateRange, key: F) -> Vec<GroupBreakdown>
where
    F: Fn(&'a OrderRecord) -> &'a str,
{
    let mut groups: BTreeMap<&str, GroupTotals> = BTreeMap::new();
    for row in orders.iter().filter(|row| range.contains(row.date_shipped)) {
        let totals = groups.entry(key(row)).or_default();
        totals.revenue += row.revenue;
        totals.ad_fees += row.ad_fees;
        totals.order_count += 1;
        totals.items_shipped += u64::from(row.items_shipped);
        totals.returns += u64::from(row.returns);
    }

    groups
        .into_iter()
        .map(|(key, totals)| GroupBreakdown {
            key: key.to_string(),
            revenue: totals.revenue,
            ad_fees: totals.ad_fees,
            order_count: totals.order_count,
            items_shipped: totals.items_shipped,
            returns: totals.returns,
            return_rate: ratio(totals.returns, totals.items_shipped),
            roi: Roi::from_amounts(totals.revenue, totals.ad_fees),
        })
        .collect()
}
