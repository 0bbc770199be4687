//! Calendar math for Lifewall.
//!
//! Pure, I/O-free helpers shared by the wallpaper generator and the plugin
//! sandbox:
//! - Date parsing (`YYYY-MM-DD` or RFC 3339)
//! - Token-based date formatting (`YYYY`, `MM`, `DD`)
//! - Derived counters (weeks lived, day of year, day distances)
//!
//! Nothing here reads the clock; callers pass the dates they care about.

mod counters;
mod format;

pub use counters::{add_days, day_of_year, days_between, weekday_name, weeks_lived};
pub use format::{format_date, parse_date};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, CalendarError>;

/// Errors that can occur in calendar operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("invalid date '{0}': expected YYYY-MM-DD or RFC 3339")]
    InvalidDate(String),

    #[error("date arithmetic out of range: {0}")]
    OutOfRange(String),
}
