use chrono::{Datelike, Months, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Older than the cutoff; the snapshot copy is trusted.
    Stable,
    /// On or after the cutoff; only the newest extract is trusted.
    Volatile,
}

/// The sliding window every incremental sync re-supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub cutoff: NaiveDate,
    pub lookback_periods: u32,
}

impl Window {
    pub fn new(today: NaiveDate, lookback_periods: u32) -> Self {
        Self {
            cutoff: cutoff(today, lookback_periods),
            lookback_periods,
        }
    }

    pub fn region(&self, date: NaiveDate) -> Region {
        if date >= self.cutoff {
            Region::Volatile
        } else {
            Region::Stable
        }
    }

    pub fn is_stable(&self, date: NaiveDate) -> bool {
        self.region(date) == Region::Stable
    }
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month `lookback_periods` months before `today`'s month.
pub fn cutoff(today: NaiveDate, lookback_periods: u32) -> NaiveDate {
    let first = first_day_of_month(today);
    first
        .checked_sub_months(Months::new(lookback_periods))
        .unwrap_or(NaiveDate::MIN)
}
