// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Wingman configuration system.

use std::path::Path;

use wingman_config::diagnostic::ConfigError;
use wingman_config::model::WingmanConfig;
use wingman_config::{load_and_validate_str, load_config_from_path, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[agent]
name = "jarvis"
log_level = "debug"
temperature = 0.2
max_tokens = 1024
workspace = "/tmp/wingman"

[providers]
default = "kimi"
max_attempts = 2
backoff_base_ms = 10

[[providers.backends]]
name = "kimi"
api_base = "https://api.moonshot.ai/v1"
api_key_env = "KIMI_API_KEY"
model = "kimi-k2"

[[providers.backends]]
name = "local"
api_base = "http://localhost:11434/v1"
model = "llama3"
context_window = 8192

[session]
history_limit = 20

[session.overrides.dm]
denied_tools = ["bash", "http_fetch"]
max_tool_iterations = 10

[tools]
timeout_secs = 30
disabled = ["http_fetch"]
workspace_sandboxed = false
blocked_commands = ["shutdown"]

[[rate_limit.limits]]
key = "provider:kimi"
strategy = "sliding_window"
max_requests = 60
window_secs = 60.0

[heartbeat]
tick_secs = 2

[gateway]
port = 9000
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.agent.name, "jarvis");
    assert_eq!(config.agent.max_tokens, 1024);
    assert_eq!(config.providers.default.as_deref(), Some("kimi"));
    assert_eq!(config.providers.backends.len(), 2);
    assert_eq!(config.providers.backends[1].context_window, 8192);
    assert_eq!(config.providers.backends[0].context_window, 128_000);
    assert_eq!(config.session.history_limit, 20);
    let dm = &config.session.overrides["dm"];
    assert_eq!(dm.max_tool_iterations, Some(10));
    assert_eq!(
        dm.denied_tools.as_deref(),
        Some(&["bash".to_string(), "http_fetch".to_string()][..])
    );
    assert_eq!(config.tools.timeout_secs, 30);
    assert!(!config.tools.workspace_sandboxed);
    assert_eq!(config.tools.blocked_commands, ["shutdown"]);
    assert_eq!(config.rate_limit.limits[0].strategy, "sliding_window");
    assert_eq!(config.heartbeat.tick_secs, 2);
    assert_eq!(config.gateway.port, 9000);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should load");
    assert_eq!(config.agent.name, "wingman");
    assert_eq!(config.agent.log_level, "info");
    assert_eq!(config.providers.max_attempts, 3);
    assert_eq!(config.providers.failure_threshold, 3);
    assert!(config.providers.backends.is_empty());
    assert_eq!(config.session.history_limit, 50);
    assert_eq!(config.tools.timeout_secs, 300);
    assert_eq!(config.tools.max_result_chars, 50_000);
    assert!(config.tools.workspace_sandboxed);
    assert!(config.tools.blocked_commands.is_empty());
    assert_eq!(config.heartbeat.session_cleanup_secs, 300);
    assert_eq!(config.gateway.port, 18789);
    assert_eq!(config.gateway.max_frame_bytes, 16 * 1024 * 1024);
}

#[test]
fn unknown_field_in_section_is_rejected_with_suggestion() {
    let toml = r#"
[providers]
max_atempts = 2
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownKey { key, table, suggestion, .. }
            if key == "max_atempts"
                && table == "providers"
                && suggestion.as_deref() == Some("max_attempts")
    )));
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n")
        .expect_err("unknown section should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "telegram"))
    );
}

#[test]
fn invalid_type_is_reported() {
    let errors = load_and_validate_str("[gateway]\nport = \"many\"\n")
        .expect_err("string port should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::BadValue { key, detail } if key.ends_with("port") && detail.contains("expected")))
    );
}

#[test]
fn missing_backend_field_is_reported() {
    let toml = r#"
[[providers.backends]]
name = "kimi"
api_base = "https://api.moonshot.ai/v1"
"#;
    let errors = load_and_validate_str(toml).expect_err("model is required");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::BadValue { key, detail } if key.ends_with("model") && detail == "missing required key"))
    );
}

#[test]
fn validation_rejects_unknown_session_kind_and_strategy() {
    let toml = r#"
[session.overrides.guild]
max_tool_iterations = 3

[[rate_limit.limits]]
key = "provider:x"
strategy = "leaky"
max_requests = 5
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Invalid(message) if message.contains("guild"))
    ));
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Invalid(message) if message.contains("leaky"))
    ));
}

#[test]
fn validation_rejects_default_that_names_no_backend() {
    let toml = r#"
[providers]
default = "missing"

[[providers.backends]]
name = "kimi"
api_base = "https://api.moonshot.ai/v1"
model = "kimi-k2"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Invalid(message) if message.contains("providers.default"))
    ));
}

#[test]
fn validation_rejects_duplicate_backends() {
    let toml = r#"
[[providers.backends]]
name = "a"
api_base = "https://one.example/v1"
model = "m"

[[providers.backends]]
name = "a"
api_base = "https://two.example/v1"
model = "m"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Invalid(message) if message.contains("duplicate backend"))
    ));
}

#[test]
fn env_var_overrides_file_value() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("wingman.toml", "[gateway]\nport = 7000\n")?;
        jail.set_env("WINGMAN_GATEWAY_PORT", "7100");
        jail.set_env("WINGMAN_PROVIDERS_MAX_ATTEMPTS", "5");

        let config = load_config_from_path(Path::new("wingman.toml"))?;
        assert_eq!(config.gateway.port, 7100);
        assert_eq!(config.providers.max_attempts, 5);
        Ok(())
    });
}

#[test]
fn missing_config_file_is_skipped() {
    let config = load_config_from_path(Path::new("/nonexistent/wingman.toml"))
        .expect("missing file should fall back to defaults");
    assert_eq!(config.agent.name, WingmanConfig::default().agent.name);
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "naem".to_string(),
        table: String::new(),
        suggestion: Some("name".to_string()),
        hint: "did you mean `name`? valid keys: name, log_level".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `name`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("naem"));
}
