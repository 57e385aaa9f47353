use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analytics::{ratio, AnalyticsEngine};
use crate::domain::{DateRange, OrderRecord, ProductId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnedProduct {
    pub product_id: ProductId,
    pub name: String,
    pub returns: u64,
    pub items_shipped: u64,
    /// Returned units valued at list price.
    pub revenue_lost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryReturns {
    pub category: String,
    pub returns: u64,
    pub items_shipped: u64,
    pub return_rate: f64,
    pub revenue_lost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnsAnalysis {
    pub range: DateRange,
    pub overall_return_rate: f64,
    pub total_returns: u64,
    pub total_items_shipped: u64,
    pub revenue_lost_to_returns: Decimal,
    pub top_returned_products: Vec<ReturnedProduct>,
    pub by_category: Vec<CategoryReturns>,
}

impl AnalyticsEngine {
    /// Returns impact within `range`. Only products with at least one return
    /// are ranked; ties on return count go to the smaller product id.
    pub fn compute_returns_analysis(
        &self,
        orders: &[OrderRecord],
        range: DateRange,
        top_n: usize,
    ) -> ReturnsAnalysis {
        let in_range: Vec<&OrderRecord> =
            orders.iter().filter(|row| range.contains(row.date_shipped)).collect();

        let mut products: BTreeMap<&ProductId, ReturnedProduct> = BTreeMap::new();
        let mut categories: BTreeMap<&str, CategoryReturns> = BTreeMap::new();
        for row in in_range.iter().copied() {
            let product = products.entry(&row.product_id).or_insert_with(|| ReturnedProduct {
                product_id: row.product_id.clone(),
                name: row.name.clone(),
                returns: 0,
                items_shipped: 0,
                revenue_lost: Decimal::ZERO,
            });
            product.returns += u64::from(row.returns);
            product.items_shipped += u64::from(row.items_shipped);
            product.revenue_lost += row.revenue_lost();

            let category =
                categories.entry(row.short_category()).or_insert_with(|| CategoryReturns {
                    category: row.short_category().to_string(),
                    returns: 0,
                    items_shipped: 0,
                    return_rate: 0.0,
                    revenue_lost: Decimal::ZERO,
                });
            category.returns += u64::from(row.returns);
            category.items_shipped += u64::from(row.items_shipped);
            category.revenue_lost += row.revenue_lost();
        }

        let total_returns = in_range.iter().map(|row| u64::from(row.returns)).sum();
        let total_items_shipped = in_range.iter().map(|row| u64::from(row.items_shipped)).sum();
        let revenue_lost_to_returns = products.values().map(|product| product.revenue_lost).sum();

        let mut top_returned_products: Vec<ReturnedProduct> =
            products.into_values().filter(|product| product.returns > 0).collect();
        top_returned_products.sort_by(|a, b| {
            b.returns.cmp(&a.returns).then_with(|| a.product_id.cmp(&b.product_id))
        });
        top_returned_products.truncate(top_n);

        let by_category = categories
            .into_values()
            .map(|mut category| {
                category.return_rate = ratio(category.returns, category.items_shipped);
                category
            })
            .collect();

        ReturnsAnalysis {
            range,
            overall_return_rate: ratio(total_returns, total_items_shipped),
            total_returns,
            total_items_shipped,
            revenue_lost_to_returns,
            top_returned_products,
            by_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::analytics::fixtures::{earning, january, sample_dataset};
    use crate::analytics::AnalyticsEngine;

    #[test]
    fn revenue_lost_sums_returns_at_list_price() {
        let dataset = sample_dataset();
        let analysis =
            AnalyticsEngine::default().compute_returns_analysis(dataset.earnings(), january(1, 4), 10);

        assert_eq!(analysis.total_returns, 4);
        assert_eq!(analysis.total_items_shipped, 13);
        assert_eq!(analysis.revenue_lost_to_returns, Decimal::new(40, 0));
        assert!((analysis.overall_return_rate - 4.0 / 13.0).abs() < 1e-12);
    }

    #[test]
    fn top_returned_products_break_ties_by_product_id() {
        let rows = vec![
            earning(1, "B009", "Books", "PHONE", 5, 2, 10, 1),
            earning(1, "B002", "Books", "PHONE", 5, 2, 10, 1),
            earning(2, "B005", "Books", "PHONE", 5, 3, 10, 1),
            earning(2, "B001", "Books", "PHONE", 5, 0, 10, 1),
        ];
        let analysis =
            AnalyticsEngine::default().compute_returns_analysis(&rows, january(1, 2), 2);

        let ids: Vec<&str> =
            analysis.top_returned_products.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["B005", "B002"]);
    }

    #[test]
    fn categories_group_by_first_word() {
        let dataset = sample_dataset();
        let analysis =
            AnalyticsEngine::default().compute_returns_analysis(dataset.earnings(), january(1, 4), 10);

        let names: Vec<&str> = analysis.by_category.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Books", "Electronics", "Home"]);
        let electronics = &analysis.by_category[1];
        assert_eq!(electronics.returns, 3);
        assert!((electronics.return_rate - 0.3).abs() < 1e-12);
    }

    #[test]
    fn empty_range_is_zero_filled() {
        let dataset = sample_dataset();
        let analysis =
            AnalyticsEngine::default().compute_returns_analysis(dataset.earnings(), january(20, 21), 5);

        assert_eq!(analysis.total_returns, 0);
        assert_eq!(analysis.overall_return_rate, 0.0);
        assert_eq!(analysis.revenue_lost_to_returns, Decimal::ZERO);
        assert!(analysis.top_returned_products.is_empty());
        assert!(analysis.by_category.is_empty());
    }
}
