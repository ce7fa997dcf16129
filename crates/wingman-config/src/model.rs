// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Wingman agent runtime.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level Wingman configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WingmanConfig {
    /// Agent identity, model parameters and workspace location.
    #[serde(default)]
    pub agent: AgentConfig,

    /// LLM backends and failover behavior.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Session history and per-kind policy overrides.
    #[serde(default)]
    pub session: SessionConfig,

    /// Tool registry settings.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Per-key request budgets.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Background task scheduler settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// WebSocket gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Sampling temperature passed to every provider call.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on generated tokens per provider call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Directory holding memory files, sessions, transcripts and skills.
    #[serde(default = "default_workspace")]
    pub workspace: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            workspace: default_workspace(),
        }
    }
}

fn default_agent_name() -> String {
    "wingman".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_workspace() -> String {
    dirs::data_dir()
        .map(|p| p.join("wingman").join("workspace"))
        .unwrap_or_else(|| std::path::PathBuf::from("workspace"))
        .to_string_lossy()
        .into_owned()
}

/// LLM backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Name of the preferred backend. Falls back to the first declared backend.
    #[serde(default)]
    pub default: Option<String>,

    /// Per-attempt timeout for a completion call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for a single health probe.
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,

    /// Attempts per backend before moving to the next one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff between attempts.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Consecutive failures after which a backend is skipped.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long a tripped backend stays skipped.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Declared backends, in fallback order.
    #[serde(default)]
    pub backends: Vec<ProviderBackendConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: None,
            request_timeout_secs: default_request_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            backends: Vec::new(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_health_timeout_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    60
}

/// One OpenAI-compatible backend (`[[providers.backends]]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderBackendConfig {
    /// Unique name used in logs, stats and rate-limit keys (`provider:{name}`).
    pub name: String,

    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,

    /// Inline API key. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Model identifier sent with each request.
    pub model: String,

    #[serde(default = "default_context_window")]
    pub context_window: u32,
}

impl ProviderBackendConfig {
    /// Resolves the API key from the inline value or the named env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
        })
    }
}

fn default_context_window() -> u32 {
    128_000
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Number of recent messages replayed to the model each call.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Directory for session documents. Defaults to `{workspace}/sessions`.
    #[serde(default)]
    pub dir: Option<String>,

    /// Per-kind policy overrides keyed by `main`, `dm`, `group`, `project`, `agent`.
    #[serde(default)]
    pub overrides: BTreeMap<String, PolicyOverride>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            dir: None,
            overrides: BTreeMap::new(),
        }
    }
}

fn default_history_limit() -> usize {
    50
}

/// Fields that replace the built-in policy for a session kind when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyOverride {
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default)]
    pub denied_tools: Option<Vec<String>>,
    #[serde(default)]
    pub max_tool_iterations: Option<u32>,
    /// One of `none`, `restricted`, `isolated`.
    #[serde(default)]
    pub sandbox: Option<String>,
    #[serde(default)]
    pub require_approval: Option<bool>,
}

/// Tool registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Expose tools to the model at all.
    #[serde(default = "default_tools_enabled")]
    pub enabled: bool,

    /// Per-invocation timeout.
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,

    /// Tool results longer than this are truncated before reaching the model.
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,

    /// Built-in tools that should not be registered.
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Keep file tools and shell working directories inside the workspace.
    #[serde(default = "default_workspace_sandboxed")]
    pub workspace_sandboxed: bool,

    /// Extra substrings that make `bash` refuse a command (case-insensitive).
    #[serde(default)]
    pub blocked_commands: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_tools_enabled(),
            timeout_secs: default_tool_timeout_secs(),
            max_result_chars: default_max_result_chars(),
            disabled: Vec::new(),
            workspace_sandboxed: default_workspace_sandboxed(),
            blocked_commands: Vec::new(),
        }
    }
}

fn default_tools_enabled() -> bool {
    true
}

fn default_workspace_sandboxed() -> bool {
    true
}

fn default_tool_timeout_secs() -> u64 {
    300
}

fn default_max_result_chars() -> usize {
    50_000
}

/// Rate limit configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Budgets applied per key (`[[rate_limit.limits]]`).
    #[serde(default)]
    pub limits: Vec<RateLimitEntry>,
}

/// A single keyed budget.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitEntry {
    /// Budget key, e.g. `provider:openai`.
    pub key: String,

    /// `token_bucket` or `sliding_window`.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    pub max_requests: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Bucket capacity. Defaults to `max_requests`.
    #[serde(default)]
    pub burst: Option<u32>,
}

fn default_strategy() -> String {
    "token_bucket".to_string()
}

fn default_window_secs() -> f64 {
    60.0
}

/// Heartbeat scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_enabled")]
    pub enabled: bool,

    /// Scheduler wake-up period.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Period of the idle-session eviction task.
    #[serde(default = "default_session_cleanup_secs")]
    pub session_cleanup_secs: u64,

    /// Sessions untouched for longer than this are flushed and evicted.
    #[serde(default = "default_session_max_idle_secs")]
    pub session_max_idle_secs: u64,

    /// Periodically log provider health.
    #[serde(default)]
    pub provider_health_enabled: bool,

    #[serde(default = "default_provider_health_secs")]
    pub provider_health_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: default_heartbeat_enabled(),
            tick_secs: default_tick_secs(),
            session_cleanup_secs: default_session_cleanup_secs(),
            session_max_idle_secs: default_session_max_idle_secs(),
            provider_health_enabled: false,
            provider_health_secs: default_provider_health_secs(),
        }
    }
}

fn default_heartbeat_enabled() -> bool {
    true
}

fn default_tick_secs() -> u64 {
    1
}

fn default_session_cleanup_secs() -> u64 {
    300
}

fn default_session_max_idle_secs() -> u64 {
    3600
}

fn default_provider_health_secs() -> u64 {
    300
}

/// WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Largest accepted WebSocket frame.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    18789
}

fn default_max_frame_bytes() -> usize {
    16 * 1024 * 1024
}
