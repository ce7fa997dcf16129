// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./wingman.toml` > `~/.config/wingman/wingman.toml` >
//! `/etc/wingman/wingman.toml` with environment variable overrides via `WINGMAN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::WingmanConfig;

/// Top-level sections that environment variables may address.
const ENV_SECTIONS: &[&str] = &[
    "agent",
    "providers",
    "session",
    "tools",
    "rate_limit",
    "heartbeat",
    "gateway",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wingman/wingman.toml` (system-wide)
/// 3. `~/.config/wingman/wingman.toml` (user XDG config)
/// 4. `./wingman.toml` (local directory)
/// 5. `WINGMAN_*` environment variables
pub fn load_config() -> Result<WingmanConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<WingmanConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WingmanConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WingmanConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WingmanConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(WingmanConfig::default()))
        .merge(Toml::file("/etc/wingman/wingman.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("wingman/wingman.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("wingman.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `WINGMAN_PROVIDERS_MAX_ATTEMPTS` must map to
/// `providers.max_attempts`, and `WINGMAN_RATE_LIMIT_...` must keep `rate_limit` whole.
fn env_provider() -> Env {
    Env::prefixed("WINGMAN_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env var name onto a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
