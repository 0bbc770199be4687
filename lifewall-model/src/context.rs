//! Per-request rendering inputs supplied by the request-handling layer.

use crate::ModelError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which calendar layout the wallpaper renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Whole life in weeks.
    #[default]
    Life,
    /// Current year in days.
    Year,
    /// Current month in days.
    Month,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Life => "life",
            Self::Year => "year",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "life" => Ok(Self::Life),
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            _ => Err(ModelError::UnknownViewMode(s.to_string())),
        }
    }
}

/// Request-level context shared by every plugin in a batch, before
/// per-plugin settings are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub view_mode: ViewMode,
    /// IANA timezone identifier, e.g. `"Europe/Paris"`.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl RequestContext {
    pub fn new(width: u32, height: u32, view_mode: ViewMode) -> Self {
        Self {
            birth_date: None,
            width,
            height,
            view_mode,
            timezone: None,
        }
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}
