//! Date parsing and `YYYY`/`MM`/`DD` token formatting.

use crate::{CalendarError, Result};
use chrono::{DateTime, Datelike, NaiveDate};

/// Parses a calendar date.
///
/// Accepts a plain `YYYY-MM-DD` date or a full RFC 3339 timestamp, in which
/// case the date is taken in the timestamp's own offset.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.date_naive())
        .map_err(|_| CalendarError::InvalidDate(input.to_string()))
}

/// Substitutes `YYYY`, `MM` and `DD` tokens in `pattern` with the zero-padded
/// year, month and day of `date`. Other characters pass through untouched.
pub fn format_date(date: NaiveDate, pattern: &str) -> String {
    pattern
        .replace("YYYY", &format!("{:04}", date.year()))
        .replace("MM", &format!("{:02}", date.month()))
        .replace("DD", &format!("{:02}", date.day()))
}
