use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analytics::{ratio, AnalyticsEngine};
use crate::domain::{DailyTrendRecord, DateRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyConversion {
    pub date: NaiveDate,
    pub clicks: u64,
    pub items_ordered: u64,
    /// Items ordered per click; 0 on days without clicks.
    pub rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub range: DateRange,
    pub daily_series: Vec<DailyConversion>,
    pub average_rate: f64,
    pub best_day: Option<DailyConversion>,
    pub worst_day: Option<DailyConversion>,
    pub trend: Trend,
    pub total_clicks: u64,
    pub total_items_ordered: u64,
}

impl AnalyticsEngine {
    /// Conversion over the days of `range` that appear in the trends table.
    pub fn compute_conversion(
        &self,
        trends: &[DailyTrendRecord],
        range: DateRange,
    ) -> ConversionSummary {
        let mut per_day: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
        for record in trends.iter().filter(|record| range.contains(record.date)) {
            let entry = per_day.entry(record.date).or_insert((0, 0));
            entry.0 += u64::from(record.clicks);
            entry.1 += u64::from(record.total_items_ordered);
        }

        let daily_series: Vec<DailyConversion> = per_day
            .into_iter()
            .map(|(date, (clicks, items_ordered))| DailyConversion {
                date,
                clicks,
                items_ordered,
                rate: ratio(items_ordered, clicks),
            })
            .collect();

        let rates: Vec<f64> = daily_series.iter().map(|day| day.rate).collect();
        let total_clicks = daily_series.iter().map(|day| day.clicks).sum();
        let total_items_ordered = daily_series.iter().map(|day| day.items_ordered).sum();

        // Strict comparisons keep the earliest day on ties.
        let mut best_day: Option<&DailyConversion> = None;
        let mut worst_day: Option<&DailyConversion> = None;
        for day in &daily_series {
            if best_day.map_or(true, |best| day.rate > best.rate) {
                best_day = Some(day);
            }
            if worst_day.map_or(true, |worst| day.rate < worst.rate) {
                worst_day = Some(day);
            }
        }

        ConversionSummary {
            range,
            average_rate: mean(&rates),
            best_day: best_day.cloned(),
            worst_day: worst_day.cloned(),
            trend: self.classify_trend(&rates),
            total_clicks,
            total_items_ordered,
            daily_series,
        }
    }

    fn classify_trend(&self, rates: &[f64]) -> Trend {
        if rates.len() < 2 {
            return Trend::Stable;
        }
        let (first, second) = rates.split_at(rates.len() / 2);
        let delta = mean(second) - mean(first);
        if delta > self.trend_epsilon {
            Trend::Up
        } else if -delta > self.trend_epsilon {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::Trend;
    use crate::analytics::fixtures::{day, january, trend};
    use crate::analytics::AnalyticsEngine;

    #[test]
    fn zero_click_days_report_zero_rate() {
        let summary = AnalyticsEngine::default()
            .compute_conversion(&[trend(1, 0, 0), trend(2, 0, 3)], january(1, 2));

        assert!(summary.daily_series.iter().all(|day| day.rate == 0.0));
        assert!(!summary.average_rate.is_nan());
        assert_eq!(summary.total_items_ordered, 3);
    }

    #[test]
    fn rates_are_never_negative_or_nan() {
        let trends = [trend(1, 10, 1), trend(2, 0, 0), trend(3, 20, 4), trend(4, 7, 0)];
        let summary = AnalyticsEngine::default().compute_conversion(&trends, january(1, 4));

        assert_eq!(summary.daily_series.len(), 4);
        for day in &summary.daily_series {
            assert!(day.rate >= 0.0 && day.rate.is_finite());
        }
        assert!(summary.average_rate >= 0.0 && summary.average_rate.is_finite());
    }

    #[test]
    fn best_and_worst_ties_resolve_to_earliest_day() {
        let trends = [trend(1, 10, 1), trend(2, 10, 5), trend(3, 10, 1), trend(4, 10, 5)];
        let summary = AnalyticsEngine::default().compute_conversion(&trends, january(1, 4));

        assert_eq!(summary.best_day.map(|d| d.date), Some(day(2)));
        assert_eq!(summary.worst_day.map(|d| d.date), Some(day(1)));
        assert!((summary.average_rate - 0.3).abs() < 1e-12);
    }

    #[test]
    fn trend_compares_half_window_means() {
        let engine = AnalyticsEngine::default();
        let rising = [trend(1, 10, 1), trend(2, 10, 1), trend(3, 10, 5), trend(4, 10, 5)];
        let falling = [trend(1, 10, 5), trend(2, 10, 5), trend(3, 10, 1), trend(4, 10, 1)];
        let flat = [trend(1, 100, 10), trend(2, 100, 10), trend(3, 100, 10), trend(4, 100, 10)];

        assert_eq!(engine.compute_conversion(&rising, january(1, 4)).trend, Trend::Up);
        assert_eq!(engine.compute_conversion(&falling, january(1, 4)).trend, Trend::Down);
        assert_eq!(engine.compute_conversion(&flat, january(1, 4)).trend, Trend::Stable);
        assert_eq!(engine.compute_conversion(&rising[..1], january(1, 4)).trend, Trend::Stable);
    }

    #[test]
    fn empty_range_yields_zero_filled_summary() {
        let summary =
            AnalyticsEngine::default().compute_conversion(&[trend(1, 10, 1)], january(5, 9));

        assert!(summary.daily_series.is_empty());
        assert_eq!(summary.average_rate, 0.0);
        assert_eq!(summary.best_day, None);
        assert_eq!(summary.trend, Trend::Stable);
        assert_eq!(summary.total_clicks, 0);
    }

    #[test]
    fn conversion_is_idempotent() {
        let engine = AnalyticsEngine::default();
        let trends = [trend(1, 10, 1), trend(3, 20, 4)];
        assert_eq!(
            engine.compute_conversion(&trends, january(1, 3)),
            engine.compute_conversion(&trends, january(1, 3))
        );
    }
}
