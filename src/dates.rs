use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Prefix given to every row whose `Date` cannot be read as a calendar date.
pub const NA_PREFIX: &str = "N/A-";
pub const BEGINNING_BALANCE: &str = "Beginning Balance";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const ZONED_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// The `Date` field of a report row.
///
/// Rows only collapse to text when written out; inside the pipeline the three
/// cases stay distinct so that placeholders never compare against real dates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowDate {
    Valid(NaiveDate),
    /// No determinable date; the reason text is kept so rows stay addressable.
    Sentinel(String),
    /// Original cell text, untrimmed.
    Unparsed(String),
}

impl RowDate {
    pub fn parse(raw: &str) -> Self {
        if let Some(reason) = raw.trim_start().strip_prefix(NA_PREFIX) {
            return Self::Sentinel(reason.to_string());
        }
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(BEGINNING_BALANCE) {
            return Self::Sentinel(BEGINNING_BALANCE.to_string());
        }
        match parse_calendar_date(trimmed) {
            Some(date) => Self::Valid(date),
            None => Self::Unparsed(raw.to_string()),
        }
    }

    pub fn valid(&self) -> Option<NaiveDate> {
        match self {
            Self::Valid(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// True for the opening-balance placeholder the ledger reports emit.
    pub fn is_beginning_balance(&self) -> bool {
        matches!(self, Self::Sentinel(reason) if reason.trim().eq_ignore_ascii_case(BEGINNING_BALANCE))
    }

    pub fn render(&self) -> String {
        match self {
            Self::Valid(d) => d.format(DATE_FORMAT).to_string(),
            Self::Sentinel(text) | Self::Unparsed(text) => format!("{NA_PREFIX}{text}"),
        }
    }
}

impl fmt::Display for RowDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Parse a raw date into a UTC calendar date.
///
/// Offsets are converted to UTC before the date is taken; timestamps without
/// an offset are read as UTC.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in ZONED_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc).date_naive());
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().date_naive());
        }
    }
    parse_date_mdy(raw)
}

pub fn parse_date_mdy(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.trim().split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}
