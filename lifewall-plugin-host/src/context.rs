//! Builds the read-only context handed to each plugin invocation.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use lifewall_model::{RequestContext, Settings, ViewMode};
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Everything a plugin can read about the current request.
///
/// Plugins receive a copy; nothing they do reaches back into this value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionContext {
    pub current_date: DateTime<FixedOffset>,
    pub birth_date: Option<NaiveDate>,
    pub width: u32,
    pub height: u32,
    pub view_mode: ViewMode,
    pub settings: Settings,
    /// Timezone `current_date` is expressed in; `None` means UTC.
    pub timezone: Option<String>,
}

impl ExecutionContext {
    /// Calendar date of `current_date` in its own offset.
    pub fn today(&self) -> NaiveDate {
        self.current_date.date_naive()
    }

    /// Formats today's date with `YYYY`/`MM`/`DD` tokens.
    pub fn format_date(&self, pattern: &str) -> String {
        lifewall_calendar::format_date(self.today(), pattern)
    }

    /// Whole weeks since the birth date, if one was supplied.
    pub fn weeks_lived(&self) -> Option<i64> {
        self.birth_date
            .map(|birth| lifewall_calendar::weeks_lived(birth, self.today()))
    }

    pub fn day_of_year(&self) -> u32 {
        lifewall_calendar::day_of_year(self.today())
    }

    /// A fresh copy of this context carrying `settings`.
    pub fn with_settings(&self, settings: Settings) -> Self {
        Self {
            settings,
            ..self.clone()
        }
    }
}

/// Non-fatal problems found while building a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextWarning {
    /// The timezone was not recognized; UTC was used instead.
    UnknownTimezone { timezone: String },
}

impl fmt::Display for ContextWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTimezone { timezone } => {
                write!(f, "unknown timezone '{timezone}', using UTC")
            }
        }
    }
}

/// A context plus any warnings raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltContext {
    pub context: ExecutionContext,
    pub warnings: Vec<ContextWarning>,
}

/// Builds a context for "now".
pub fn build_context(
    birth_date: Option<NaiveDate>,
    width: u32,
    height: u32,
    view_mode: ViewMode,
    settings: Settings,
    timezone: Option<&str>,
) -> BuiltContext {
    build_context_at(Utc::now(), birth_date, width, height, view_mode, settings, timezone)
}

/// Builds a context for an explicit instant.
pub fn build_context_at(
    now: DateTime<Utc>,
    birth_date: Option<NaiveDate>,
    width: u32,
    height: u32,
    view_mode: ViewMode,
    settings: Settings,
    timezone: Option<&str>,
) -> BuiltContext {
    let mut warnings = Vec::new();
    let requested = timezone.map(str::trim).filter(|tz| !tz.is_empty());

    let (current_date, timezone) = match requested {
        None => (now.fixed_offset(), None),
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => (now.with_timezone(&tz).fixed_offset(), Some(name.to_string())),
            Err(_) => {
                warn!(timezone = %name, "Unknown timezone, falling back to UTC");
                warnings.push(ContextWarning::UnknownTimezone {
                    timezone: name.to_string(),
                });
                (now.fixed_offset(), None)
            }
        },
    };

    BuiltContext {
        context: ExecutionContext {
            current_date,
            birth_date,
            width,
            height,
            view_mode,
            settings,
            timezone,
        },
        warnings,
    }
}

/// Builds a context from request-level inputs plus one plugin's settings.
pub fn context_for_request(request: &RequestContext, settings: Settings, now: DateTime<Utc>) -> BuiltContext {
    build_context_at(
        now,
        request.birth_date,
        request.width,
        request.height,
        request.view_mode,
        settings,
        request.timezone.as_deref(),
    )
}
