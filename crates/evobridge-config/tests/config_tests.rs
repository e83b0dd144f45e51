// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Evobridge configuration system.

use evobridge_config::diagnostic::ConfigError;
use evobridge_config::model::EvobridgeConfig;
use evobridge_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use serial_test::serial;

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[service]
name = "bridge-eu"
log_level = "debug"

[evolution]
api_url = "https://evo.example.com"
api_key = "secret"
webhook_url = "https://bridge.example.com/webhooks/evolution"
state_timeout_secs = 3
request_timeout_secs = 20

[storage]
database_path = "/tmp/evobridge-test.db"
wal_mode = false

[supervisor]
check_interval_secs = 60
max_retries = 5

[gateway]
host = "0.0.0.0"
port = 8088
bearer_token = "tok"

[prometheus]
enabled = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "bridge-eu");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.evolution.api_url, "https://evo.example.com");
    assert_eq!(config.evolution.api_key.as_deref(), Some("secret"));
    assert_eq!(config.evolution.state_timeout_secs, 3);
    assert_eq!(config.evolution.request_timeout_secs, 20);
    assert_eq!(config.storage.database_path, "/tmp/evobridge-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.supervisor.check_interval_secs, 60);
    assert_eq!(config.supervisor.max_retries, 5);
    // Unset supervisor keys keep their defaults.
    assert_eq!(config.supervisor.health_interval_secs, 900);
    assert_eq!(config.gateway.port, 8088);
    assert_eq!(config.gateway.bearer_token.as_deref(), Some("tok"));
    assert!(!config.prometheus.enabled);
}

/// Defaults equal the supervisor constants.
#[test]
fn supervisor_defaults_match_constants() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    let sup = &config.supervisor;
    assert!(sup.enabled);
    assert_eq!(sup.check_interval_secs, 120);
    assert_eq!(sup.health_interval_secs, 900);
    assert_eq!(sup.reset_interval_secs, 3600);
    assert_eq!(sup.stale_after_secs, 1800);
    assert_eq!(sup.monitor_window_secs, 3600);
    assert_eq!(sup.max_retries, 3);
    assert_eq!(sup.restart_settle_secs, 5);
    assert_eq!(sup.recreate_settle_secs, 2);
    assert_eq!(sup.remediation_timeout_secs, 30);
    assert_eq!(sup.event_buffer, 256);

    assert_eq!(config.evolution.state_timeout_secs, 5);
    assert_eq!(config.evolution.request_timeout_secs, 30);
    assert_eq!(config.evolution.health_path, "/health");
    assert!(config.evolution.api_key.is_none());
    assert_eq!(config.service.name, "evobridge");
    assert_eq!(config.service.log_level, "info");
    assert!(config.storage.wal_mode);
    assert_eq!(config.gateway.host, "127.0.0.1");
    assert!(config.prometheus.enabled);
}

/// Unknown field in [supervisor] is rejected.
#[test]
fn unknown_field_in_supervisor_produces_error() {
    let toml = r#"
[supervisor]
max_retires = 4
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("max_retires"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[crm]
token = "x"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("crm"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Dotted overrides (what the env provider produces) land in the right field.
#[test]
fn dotted_override_sets_underscored_key() {
    use figment::{Figment, providers::Serialized};

    let config: EvobridgeConfig = Figment::new()
        .merge(Serialized::defaults(EvobridgeConfig::default()))
        .merge(("evolution.api_key", "from-env"))
        .merge(("supervisor.max_retries", 7))
        .extract()
        .expect("should set keys via dot notation");

    assert_eq!(config.evolution.api_key.as_deref(), Some("from-env"));
    assert_eq!(config.supervisor.max_retries, 7);
}

/// EVOBRIDGE_* variables override file values.
#[test]
#[serial]
fn env_var_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evobridge.toml");
    std::fs::write(&path, "[evolution]\napi_key = \"from-file\"\n").unwrap();

    // SAFETY: serialized with other env-mutating tests.
    unsafe { std::env::set_var("EVOBRIDGE_EVOLUTION_API_KEY", "from-env") };
    let result = load_and_validate_path(&path);
    unsafe { std::env::remove_var("EVOBRIDGE_EVOLUTION_API_KEY") };

    let config = result.expect("config should load");
    assert_eq!(config.evolution.api_key.as_deref(), Some("from-env"));
}

/// Missing config files are silently skipped.
#[test]
#[serial]
fn missing_config_file_uses_defaults() {
    let config = load_and_validate_path(std::path::Path::new("/nonexistent/evobridge.toml"))
        .expect("missing file should be skipped");
    assert_eq!(config.supervisor.max_retries, 3);
}

/// Unknown key produces an UnknownKey diagnostic with a suggestion.
#[test]
fn diagnostic_suggests_valid_key() {
    let toml = r#"
[supervisor]
max_retires = 4
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "max_retires"
                && suggestion.as_deref() == Some("max_retries")
                && valid_keys.contains("check_interval_secs")
        })
    });
    assert!(found, "expected UnknownKey for max_retires, got: {errors:?}");
}

/// Unknown key in a file resolves a source span.
#[test]
#[serial]
fn diagnostic_unknown_key_in_file_has_span() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evobridge.toml");
    std::fs::write(&path, "[gateway]\nprot = 8080\n").unwrap();

    let errors = load_and_validate_path(&path).expect_err("should produce errors");
    let span = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey { key, span, .. } if key == "prot" => Some(*span),
        _ => None,
    });
    let span = span.expect("UnknownKey for prot").expect("span resolved");
    assert_eq!(span.offset(), "[gateway]\n".len());
    assert_eq!(span.len(), 4);
}

/// String where a number is expected produces InvalidType.
#[test]
fn diagnostic_invalid_type() {
    let toml = r#"
[supervisor]
check_interval_secs = "two minutes"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidType { key, .. } if key.contains("check_interval_secs")
        )),
        "got: {errors:?}"
    );
}

/// Validation runs after a successful load.
#[test]
fn validation_rejects_zero_interval_and_retries() {
    let toml = r#"
[supervisor]
health_interval_secs = 0
max_retries = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { message } if message.contains("health_interval_secs")
    )));
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { message } if message.contains("max_retries")
    )));
}

/// ConfigError renders through miette with its help text.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "prot".to_string(),
        suggestion: Some("port".to_string()),
        valid_keys: "enabled, host, port, bearer_token".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `port`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("prot"));
}
