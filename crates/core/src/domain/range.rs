use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::AnalyticsError;

/// Inclusive calendar window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, AnalyticsError> {
        if from > to {
            return Err(AnalyticsError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    /// The `days`-long window ending on `end`, never starting before `floor`.
    pub fn trailing(end: NaiveDate, days: u32, floor: NaiveDate) -> Self {
        let span = i64::from(days.max(1)) - 1;
        let from = end
            .checked_sub_signed(Duration::days(span))
            .map_or(floor, |start| start.max(floor))
            .min(end);
        Self { from, to: end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn covers(&self, other: &DateRange) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    pub fn day_count(&self) -> usize {
        usize::try_from((self.to - self.from).num_days() + 1).unwrap_or(0)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let from = self.from;
        (0..self.day_count()).filter_map(move |offset| {
            i64::try_from(offset).ok().and_then(|offset| from.checked_add_signed(Duration::days(offset)))
        })
    }

    /// Smallest range covering every date in `dates`.
    pub fn spanning(dates: impl IntoIterator<Item = NaiveDate>) -> Option<Self> {
        dates.into_iter().fold(None, |acc, date| match acc {
            None => Some(Self::single(date)),
            Some(range) => Some(Self { from: range.from.min(date), to: range.to.max(date) }),
        })
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}
