//! Plugin entry points.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two functions a plugin may export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hook {
    /// `calculate(ctx)`: may override the effective date and attach data.
    Calculate,
    /// `render(ctx)`: emits text elements for the compositor.
    Render,
}

impl Hook {
    /// Hooks in the order the orchestrator runs them.
    pub const ALL: [Hook; 2] = [Hook::Calculate, Hook::Render];

    /// Script function name for this hook.
    pub fn entry_point(&self) -> &'static str {
        match self {
            Self::Calculate => "calculate",
            Self::Render => "render",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

impl FromStr for Hook {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calculate" => Ok(Self::Calculate),
            "render" => Ok(Self::Render),
            other => Err(format!("unknown hook '{other}': expected calculate or render")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_names() {
        assert_eq!(Hook::Calculate.entry_point(), "calculate");
        assert_eq!(Hook::Render.to_string(), "render");
        assert_eq!("render".parse::<Hook>().unwrap(), Hook::Render);
        assert!("draw".parse::<Hook>().is_err());
    }
}
