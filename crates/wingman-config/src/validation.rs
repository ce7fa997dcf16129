// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as unique backend names, known strategies and positive windows.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::WingmanConfig;

/// Session kinds accepted as keys of `[session.overrides]`.
pub const SESSION_KINDS: &[&str] = &["main", "dm", "group", "project", "agent"];

/// Sandbox levels accepted in policy overrides.
pub const SANDBOX_LEVELS: &[&str] = &["none", "restricted", "isolated"];

/// Rate limit strategies accepted in `[[rate_limit.limits]]`.
pub const RATE_LIMIT_STRATEGIES: &[&str] = &["token_bucket", "sliding_window"];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// every collected validation error (does not fail fast).
pub fn validate_config(config: &WingmanConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_agent(config, &mut errors);
    validate_providers(config, &mut errors);
    validate_session(config, &mut errors);
    validate_rate_limits(config, &mut errors);

    if config.heartbeat.tick_secs == 0 {
        errors.push(ConfigError::validation("heartbeat.tick_secs must be at least 1"));
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    }

    if config.tools.max_result_chars == 0 {
        errors.push(ConfigError::validation(
            "tools.max_result_chars must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_agent(config: &WingmanConfig, errors: &mut Vec<ConfigError>) {
    let agent = &config.agent;

    if !LOG_LEVELS.contains(&agent.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "agent.log_level `{}` is not one of {}",
            agent.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if !(0.0..=2.0).contains(&agent.temperature) {
        errors.push(ConfigError::validation(format!(
            "agent.temperature must be between 0.0 and 2.0, got {}",
            agent.temperature
        )));
    }

    if agent.workspace.trim().is_empty() {
        errors.push(ConfigError::validation("agent.workspace must not be empty"));
    }
}

fn validate_providers(config: &WingmanConfig, errors: &mut Vec<ConfigError>) {
    let providers = &config.providers;

    if providers.max_attempts == 0 {
        errors.push(ConfigError::validation(
            "providers.max_attempts must be at least 1",
        ));
    }

    if providers.failure_threshold == 0 {
        errors.push(ConfigError::validation(
            "providers.failure_threshold must be at least 1",
        ));
    }

    let mut seen = HashSet::new();
    for (i, backend) in providers.backends.iter().enumerate() {
        if backend.name.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "providers.backends[{i}].name must not be empty"
            )));
        } else if !seen.insert(backend.name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate backend name `{}` in [[providers.backends]]",
                backend.name
            )));
        }

        if !backend.api_base.starts_with("http://") && !backend.api_base.starts_with("https://") {
            errors.push(ConfigError::validation(format!(
                "providers.backends[{i}].api_base must be an http(s) URL, got `{}`",
                backend.api_base
            )));
        }
    }

    if let Some(default) = &providers.default
        && !providers.backends.is_empty()
        && !seen.contains(default.as_str())
    {
        errors.push(ConfigError::validation(format!(
            "providers.default `{default}` does not name a declared backend"
        )));
    }
}

fn validate_session(config: &WingmanConfig, errors: &mut Vec<ConfigError>) {
    for (kind, policy) in &config.session.overrides {
        if !SESSION_KINDS.contains(&kind.as_str()) {
            errors.push(ConfigError::validation(format!(
                "session.overrides.{kind}: unknown session kind (expected one of {})",
                SESSION_KINDS.join(", ")
            )));
        }

        if let Some(sandbox) = &policy.sandbox
            && !SANDBOX_LEVELS.contains(&sandbox.as_str())
        {
            errors.push(ConfigError::validation(format!(
                "session.overrides.{kind}.sandbox `{sandbox}` is not one of {}",
                SANDBOX_LEVELS.join(", ")
            )));
        }

        if policy.max_tool_iterations == Some(0) {
            errors.push(ConfigError::validation(format!(
                "session.overrides.{kind}.max_tool_iterations must be at least 1"
            )));
        }
    }
}

fn validate_rate_limits(config: &WingmanConfig, errors: &mut Vec<ConfigError>) {
    let mut seen = HashSet::new();
    for (i, limit) in config.rate_limit.limits.iter().enumerate() {
        if !seen.insert(limit.key.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate rate limit key `{}`",
                limit.key
            )));
        }

        if !RATE_LIMIT_STRATEGIES.contains(&limit.strategy.as_str()) {
            errors.push(ConfigError::validation(format!(
                "rate_limit.limits[{i}].strategy `{}` is not one of {}",
                limit.strategy,
                RATE_LIMIT_STRATEGIES.join(", ")
            )));
        }

        if limit.max_requests == 0 {
            errors.push(ConfigError::validation(format!(
                "rate_limit.limits[{i}].max_requests must be at least 1"
            )));
        }

        if limit.window_secs <= 0.0 {
            errors.push(ConfigError::validation(format!(
                "rate_limit.limits[{i}].window_secs must be positive, got {}",
                limit.window_secs
            )));
        }

        if limit.burst == Some(0) {
            errors.push(ConfigError::validation(format!(
                "rate_limit.limits[{i}].burst must be at least 1"
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&WingmanConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = WingmanConfig::default();
        config.providers.max_attempts = 0;
        config.heartbeat.tick_secs = 0;
        config.agent.temperature = 3.5;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
