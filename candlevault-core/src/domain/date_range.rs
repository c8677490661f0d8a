//! Inclusive calendar-day range, parsed from `YYYYMMDD` arguments.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Date format used on the command line and in store file names.
pub const DAY_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("invalid date '{0}': use YYYYMMDD")]
    BadFormat(String),

    #[error("begin date {begin} is after end date {end}")]
    Inverted { begin: NaiveDate, end: NaiveDate },
}

/// Inclusive range of days `[begin, end]`. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    begin: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if begin > end {
            return Err(DateRangeError::Inverted { begin, end });
        }
        Ok(Self { begin, end })
    }

    /// Single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            begin: date,
            end: date,
        }
    }

    /// Parse two `YYYYMMDD` strings.
    pub fn parse(begin: &str, end: &str) -> Result<Self, DateRangeError> {
        Self::new(parse_day(begin)?, parse_day(end)?)
    }

    pub fn begin(&self) -> NaiveDate {
        self.begin
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range (at least 1).
    pub fn len(&self) -> usize {
        (self.end - self.begin).num_days() as usize + 1
    }

    /// A range always holds at least one day.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.begin <= date && date <= self.end
    }

    /// Iterate every day, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let begin = self.begin;
        (0..self.len() as i64).map(move |offset| begin + Duration::days(offset))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.begin.format(DAY_FORMAT),
            self.end.format(DAY_FORMAT)
        )
    }
}

/// Parse a single `YYYYMMDD` day. Only the compact 8-digit form is accepted.
pub fn parse_day(raw: &str) -> Result<NaiveDate, DateRangeError> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DateRangeError::BadFormat(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, DAY_FORMAT).map_err(|_| DateRangeError::BadFormat(raw.to_string()))
}
