// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires the runtime together from configuration. Every subcommand that
//! talks to the model goes through [`build_stack`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use wingman_agent::{register_delegation_tools, AgentRuntime, RuntimeSettings};
use wingman_config::WingmanConfig;
use wingman_core::WingmanError;
use wingman_memory::{register_memory_tools, MemoryStore};
use wingman_provider::ProviderManager;
use wingman_resilience::RateLimiter;
use wingman_session::{FileSessionStore, SessionManager};
use wingman_skill::{register_builtins, Sandbox, ToolRegistry};

pub struct Stack {
    pub workspace: PathBuf,
    pub sessions: Arc<SessionManager>,
    pub providers: Arc<ProviderManager>,
    pub runtime: Arc<AgentRuntime>,
    pub model: String,
}

/// Session documents live in `session.dir`, or `{workspace}/sessions`.
pub fn session_store(config: &WingmanConfig) -> FileSessionStore {
    let dir = match &config.session.dir {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(&config.agent.workspace).join("sessions"),
    };
    FileSessionStore::new(dir)
}

pub async fn build_stack(config: &WingmanConfig) -> Result<Stack, WingmanError> {
    let workspace = PathBuf::from(&config.agent.workspace);
    let memory = Arc::new(MemoryStore::new(&workspace));
    memory.ensure_workspace().await?;

    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit.limits));
    let providers = Arc::new(ProviderManager::from_config(config, limiter)?);

    let mut registry = ToolRegistry::with_limits(
        Duration::from_secs(config.tools.timeout_secs),
        config.tools.max_result_chars,
    );
    let sandbox = if config.tools.workspace_sandboxed {
        Sandbox::new(&workspace)
    } else {
        Sandbox::open(&workspace)
    }
    .with_blocked_commands(&config.tools.blocked_commands);
    register_builtins(&mut registry, &sandbox, &config.tools.disabled);
    register_memory_tools(&mut registry, memory);
    let delegation = register_delegation_tools(&mut registry, &config.tools.disabled);
    let tools = Arc::new(registry);
    info!(count = tools.len(), "tool registry initialized");

    let sessions = Arc::new(SessionManager::with_overrides(
        Arc::new(session_store(config)),
        config.session.overrides.clone(),
    ));

    let settings = RuntimeSettings::from_config(config);
    let model = settings.model.clone();
    let runtime = Arc::new(AgentRuntime::new(
        sessions.clone(),
        providers.clone(),
        tools,
        &workspace,
        settings,
    ));
    delegation.attach(&runtime);

    Ok(Stack {
        workspace,
        sessions,
        providers,
        runtime,
        model,
    })
}
