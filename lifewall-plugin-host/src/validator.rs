//! Static screening of plugin source before it is ever executed.
//!
//! Lexical: the denylist is case-insensitive and over-rejects unusual but
//! harmless code rather than miss an escape attempt. It is not the security
//! boundary; the capability registry is. The entry-point check is only a
//! screen; compiled scripts are checked again for real hook functions.

use crate::error::PluginError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Maximum plugin source length, in characters.
pub const MAX_SOURCE_LEN: usize = 50_000;

/// Denylisted constructs: (name reported to the author, pattern).
const DENIED_PATTERNS: &[(&str, &str)] = &[
    // Dynamic evaluation and function construction
    ("eval", r"\beval\s*\("),
    ("Function constructor", r"\bnew\s+function\b|\bfunction\s*\("),
    // Module loading
    ("import", r"\bimport\b"),
    ("require", r"\brequire\s*\("),
    // Process, global and environment access
    ("process", r"\bprocess\s*\.|\bchild_process\b"),
    ("global", r"\bglobal\s*\.|\bglobalthis\b"),
    ("environment", r"\benv\s*[.(\[]"),
    // Network
    ("fetch", r"\bfetch\s*\("),
    ("XMLHttpRequest", r"\bxmlhttprequest\b"),
    ("http client", r"\bhttps?\s*\.\s*(request|get)\b"),
    ("WebSocket", r"\bwebsocket\b"),
    // Filesystem paths
    ("__dirname", r"\b__dirname\b"),
    ("__filename", r"\b__filename\b"),
];

const ENTRY_POINT_PATTERN: &str = r"\bfn\s+(calculate|render)\s*\(";

pub(crate) const MISSING_ENTRY_POINT: &str =
    "missing entry point: plugin must define a calculate() or render() function";

struct DeniedPattern {
    name: &'static str,
    regex: Regex,
}

fn case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("built-in validator pattern must compile")
}

static DENYLIST: LazyLock<Vec<DeniedPattern>> = LazyLock::new(|| {
    DENIED_PATTERNS
        .iter()
        .map(|&(name, pattern)| DeniedPattern {
            name,
            regex: case_insensitive(pattern),
        })
        .collect()
});

// Script function names are case-sensitive.
static ENTRY_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ENTRY_POINT_PATTERN).expect("built-in validator pattern must compile"));

/// Outcome of screening one source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<String>,
}

impl ValidationReport {
    pub fn into_result(self) -> Result<(), PluginError> {
        if self.valid {
            Ok(())
        } else {
            Err(PluginError::ValidationFailed {
                violations: self.violations,
            })
        }
    }
}

/// Source screener with a configurable length ceiling.
#[derive(Debug, Clone, Copy)]
pub struct SourceValidator {
    max_source_len: usize,
}

impl Default for SourceValidator {
    fn default() -> Self {
        Self::new(MAX_SOURCE_LEN)
    }
}

impl SourceValidator {
    pub fn new(max_source_len: usize) -> Self {
        Self { max_source_len }
    }

    pub fn validate(&self, source: &str) -> ValidationReport {
        let length = source.chars().count();
        if length > self.max_source_len {
            // Oversized input is not scanned further.
            return ValidationReport {
                valid: false,
                violations: vec![format!(
                    "source too long: {} characters (max {})",
                    length, self.max_source_len
                )],
            };
        }

        let mut violations: Vec<String> = DENYLIST
            .iter()
            .filter(|p| p.regex.is_match(source))
            .map(|p| format!("forbidden pattern: {}", p.name))
            .collect();

        if !ENTRY_POINT.is_match(source) {
            violations.push(MISSING_ENTRY_POINT.to_string());
        }

        ValidationReport {
            valid: violations.is_empty(),
            violations,
        }
    }
}

/// Screens `source` with the default length ceiling.
pub fn validate(source: &str) -> ValidationReport {
    SourceValidator::default().validate(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDER_OK: &str = r##"fn render(ctx) { [#{ content: "hi", x: 1, y: 2, font_size: 12, color: "#fff" }] }"##;

    #[test]
    fn accepts_plain_plugin() {
        let report = validate(RENDER_OK);
        assert!(report.valid, "{:?}", report.violations);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn accepts_either_entry_point() {
        assert!(validate("fn calculate(ctx) { #{} }").valid);
        assert!(validate("fn render(ctx) { [] }").valid);
    }

    #[test]
    fn rejects_missing_entry_point() {
        let report = validate("fn helper(x) { x + 1 }");
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].contains("missing entry point"));
    }

    #[test]
    fn rejects_each_denied_construct() {
        let cases = [
            ("eval(\"1\")", "eval"),
            ("let f = new Function('return 1');", "Function constructor"),
            ("import \"fs\" as fs;", "import"),
            ("let m = require('fs');", "require"),
            ("process.exit(1)", "process"),
            ("globalThis.x", "global"),
            ("global.thing", "global"),
            ("env.HOME", "environment"),
            ("fetch(\"https://evil\")", "fetch"),
            ("new XMLHttpRequest()", "XMLHttpRequest"),
            ("http.request(opts)", "http client"),
            ("new WebSocket(url)", "WebSocket"),
            ("let d = __dirname;", "__dirname"),
            ("let f = __filename;", "__filename"),
        ];
        for (snippet, name) in cases {
            let source = format!("fn render(ctx) {{ {snippet} }}");
            let report = validate(&source);
            assert!(!report.valid, "expected rejection for {snippet}");
            assert!(
                report.violations.iter().any(|v| v == &format!("forbidden pattern: {name}")),
                "{snippet}: {:?}",
                report.violations
            );
        }
    }

    #[test]
    fn matching_is_case_insensitive() {
        let report = validate("fn render(ctx) { EVAL (\"x\") }");
        assert!(report.violations.contains(&"forbidden pattern: eval".to_string()));
        assert!(!validate("fn render(ctx) { Fetch(\"x\") }").valid);
    }

    #[test]
    fn entry_point_names_are_case_sensitive() {
        let report = validate("fn RENDER(ctx) { [] }");
        assert_eq!(report.violations, vec![MISSING_ENTRY_POINT.to_string()]);
        assert!(!validate("fn Calculate(ctx) { #{} }").valid);
    }

    #[test]
    fn identifiers_containing_keywords_are_fine() {
        assert!(validate("fn render(ctx) { let important = 1; let retrieval = 2; [] }").valid);
    }

    #[test]
    fn rejects_oversized_source() {
        let body = "x".repeat(MAX_SOURCE_LEN);
        let report = validate(&format!("fn render(ctx) {{ {body} }}"));
        assert!(!report.valid);
        assert!(report.violations[0].starts_with("source too long"));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let validator = SourceValidator::new(24);
        let source = "fn render(ctx) { \"ééé\" }";
        assert_eq!(source.chars().count(), 24);
        assert!(validator.validate(source).valid);
    }

    #[test]
    fn reports_all_violations() {
        let report = validate("eval(x); fetch(y);");
        assert_eq!(report.violations.len(), 3);
    }

    #[test]
    fn into_result_carries_violations() {
        let err = validate("fn helper() {}").into_result().unwrap_err();
        assert!(matches!(err, PluginError::ValidationFailed { violations } if violations.len() == 1));
        assert!(validate(RENDER_OK).into_result().is_ok());
    }
}
