//! Derived day/week counters.

use crate::{CalendarError, Result};
use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Whole weeks elapsed from `birth` to `today`. A birth date in the future
/// counts as zero weeks lived.
pub fn weeks_lived(birth: NaiveDate, today: NaiveDate) -> i64 {
    days_between(birth, today).max(0) / 7
}

/// 1-based ordinal of `date` within its year.
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Signed number of days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// Shifts `date` by `days` (negative values go backwards).
pub fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    shifted.ok_or_else(|| CalendarError::OutOfRange(format!("{date} + {days} days")))
}

/// English weekday name, e.g. `"Monday"`.
pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
