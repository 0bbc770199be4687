use chrono::{DateTime, TimeZone, Utc};
use lifewall_model::ViewMode;
use lifewall_plugin_cli::{
    BatchFile, RunOptions, load_config, parse_settings, read_text, run_batch, run_hook, validate_source,
};
use lifewall_plugin_host::{ErrorKind, Hook, InvocationState, SandboxConfig};
use pretty_assertions::assert_eq;
use serde_json::json;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

const CENTERED: &str = r##"
fn render(ctx) {
    [#{ content: ctx.settings.text, x: ctx.width * 0.5, y: ctx.height * 0.5, font_size: 40, color: "#fff" }]
}
"##;

// ================================================================
// Config and input helpers
// ================================================================

#[test]
fn no_config_path_means_defaults() {
    assert_eq!(load_config(None).unwrap(), SandboxConfig::default());
}

#[test]
fn explicit_config_is_strict() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("sandbox.toml");
    std::fs::write(&good, "[limits]\ncall_timeout_ms = 250\n").unwrap();
    assert_eq!(load_config(Some(&good)).unwrap().limits.call_timeout_ms, 250);

    let bad = dir.path().join("broken.toml");
    std::fs::write(&bad, "[limits\n").unwrap();
    assert!(load_config(Some(&bad)).is_err());
    assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
}

#[test]
fn read_text_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_text(&dir.path().join("nope.rhai")).unwrap_err();
    assert!(format!("{err:#}").contains("nope.rhai"));
}

#[test]
fn settings_must_be_an_object() {
    assert_eq!(parse_settings(r#"{"a": 1}"#).unwrap()["a"], json!(1));
    assert!(parse_settings("[1]").is_err());
    assert!(parse_settings("{").is_err());
}

// ================================================================
// validate / run
// ================================================================

#[test]
fn validate_reports_violations() {
    let config = SandboxConfig::default();
    assert!(validate_source(&config, CENTERED).valid);

    let report = validate_source(&config, "fn helper() { eval(\"1\") }");
    assert!(!report.valid);
    assert_eq!(report.violations.len(), 2);
}

#[test]
fn run_render_hook() {
    let options = RunOptions {
        settings: parse_settings(r#"{"text": "hi"}"#).unwrap(),
        ..RunOptions::default()
    };
    let output = run_hook(&SandboxConfig::default(), CENTERED, &options, now()).unwrap();

    assert!(output.succeeded());
    assert_eq!(output.state, Some(InvocationState::Succeeded));
    assert_eq!(
        output.result,
        Some(json!([{
            "kind": "text",
            "content": "hi",
            "x": 585.0,
            "y": 1266.0,
            "font_size": 40.0,
            "color": "#fff",
            "align": "left"
        }]))
    );
}

#[test]
fn run_rejects_invalid_source_without_executing() {
    let options = RunOptions::default();
    let output = run_hook(&SandboxConfig::default(), "fn render(ctx) { fetch(\"x\") }", &options, now()).unwrap();
    assert_eq!(output.state, None);
    assert_eq!(output.error.unwrap().kind, ErrorKind::ValidationFailure);
}

#[test]
fn run_missing_hook() {
    let options = RunOptions {
        hook: Hook::Calculate,
        view_mode: ViewMode::Month,
        ..RunOptions::default()
    };
    let output = run_hook(&SandboxConfig::default(), CENTERED, &options, now()).unwrap();
    assert_eq!(output.state, Some(InvocationState::InvalidEntryPoint));
    assert_eq!(output.error.unwrap().kind, ErrorKind::MissingEntryPoint);
}

#[test]
fn run_surfaces_timezone_warning() {
    let options = RunOptions {
        timezone: Some("Not/AZone".into()),
        settings: parse_settings(r#"{"text": "x"}"#).unwrap(),
        ..RunOptions::default()
    };
    let output = run_hook(&SandboxConfig::default(), CENTERED, &options, now()).unwrap();
    assert_eq!(output.warnings.len(), 1);
    assert!(output.succeeded());
}

// ================================================================
// batch
// ================================================================

#[test]
fn batch_file_end_to_end() {
    let batch = json!({
        "request": { "width": 1170, "height": 2532, "view_mode": "year", "birth_date": "1990-05-17" },
        "configs": [
            { "plugin_id": "dater" },
            { "plugin_id": "label", "settings": { "text": "Hello" } },
            { "plugin_id": "missing" },
            { "plugin_id": "off", "enabled": false }
        ],
        "definitions": [
            {
                "id": "dater",
                "name": "Dater",
                "source": "fn calculate(ctx) { #{ current_date: \"2030-01-01\", data: #{ weeks: ctx.weeks_lived } } }"
            },
            { "id": "label", "name": "Label", "source": CENTERED },
            { "id": "off", "name": "Off", "source": "fn render(ctx) { throw \"never\"; }" }
        ]
    });

    let batch = BatchFile::from_json(&batch.to_string()).unwrap();
    let output = run_batch(&SandboxConfig::default(), &batch, now());

    assert_eq!(output.effective_date.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    assert_eq!(output.date_source.as_deref(), Some("dater"));
    assert_eq!(output.elements.len(), 1);
    assert_eq!(output.elements[0].content, "Hello");
    assert_eq!(output.report.order, vec!["dater", "label", "missing"]);
    assert_eq!(output.report.errors_for("missing")[0].kind, ErrorKind::UnknownPlugin);

    let rendered = serde_json::to_value(&output).unwrap();
    assert_eq!(rendered["report"]["calculation_results"]["dater"]["data"], json!({"weeks": 1764}));
}

#[test]
fn malformed_batch_is_an_error() {
    assert!(BatchFile::from_json(r#"{"configs": []}"#).is_err());
}
