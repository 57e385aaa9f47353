//! Dashboard analytics over a [`CanonicalDataset`].
//!
//! Every computation borrows its inputs, filters to an inclusive [`DateRange`]
//! and groups through `BTreeMap`, so repeated calls on the same data return the
//! same values in the same order. An empty range yields zero-filled summaries.

pub mod conversion;
pub mod dashboard;
pub mod groups;
pub mod returns;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AnalyticsConfig;
use crate::domain::{CanonicalDataset, DateRange};
use crate::errors::AnalyticsError;

pub use conversion::{ConversionSummary, DailyConversion, Trend};
pub use dashboard::{DashboardDay, ProductRanking, RankBy};
pub use groups::{CategoryShare, GroupBreakdown, LinkTypeRow, LinkTypeSummary};
pub use returns::{CategoryReturns, ReturnedProduct, ReturnsAnalysis};

/// Return on ad spend: revenue divided by ad fees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Roi {
    Ratio(f64),
    /// No ad fees were charged, so the ratio has no meaning.
    Undefined,
}

impl Roi {
    pub fn from_amounts(revenue: Decimal, ad_fees: Decimal) -> Self {
        if ad_fees.is_zero() {
            return Self::Undefined;
        }
        Self::Ratio((revenue / ad_fees).to_f64().unwrap_or(0.0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalyticsEngine {
    trend_epsilon: f64,
    default_window_days: u32,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self { trend_epsilon: 0.01, default_window_days: 30 }
    }
}

impl AnalyticsEngine {
    pub fn new(trend_epsilon: f64, default_window_days: u32) -> Self {
        Self { trend_epsilon, default_window_days }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.trend_epsilon, config.default_window_days)
    }

    pub fn trend_epsilon(&self) -> f64 {
        self.trend_epsilon
    }

    /// Trailing window of `default_window_days` ending on the last observed date.
    pub fn default_range(&self, dataset: &CanonicalDataset) -> Result<DateRange, AnalyticsError> {
        let observed = dataset.observed_range().ok_or(AnalyticsError::EmptyDataset)?;
        Ok(DateRange::trailing(observed.to, self.default_window_days, observed.from))
    }

    /// Validates a requested window against the dates present in `dataset`.
    ///
    /// A missing `to` means the last observed date; a missing `from` means the
    /// start of the default trailing window ending at `to`.
    pub fn resolve_range(
        &self,
        dataset: &CanonicalDataset,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<DateRange, AnalyticsError> {
        let observed = dataset.observed_range().ok_or(AnalyticsError::EmptyDataset)?;
        let to = to.unwrap_or(observed.to);
        let from = from
            .unwrap_or_else(|| DateRange::trailing(to, self.default_window_days, observed.from).from);

        let range = DateRange::new(from, to)?;
        if !observed.covers(&range) {
            return Err(AnalyticsError::RangeOutOfBounds {
                from,
                to,
                min: observed.from,
                max: observed.to,
            });
        }
        Ok(range)
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub(crate) fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
