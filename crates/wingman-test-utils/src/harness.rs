// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete agent stack in a temp workspace: file
//! session store, scripted provider behind a real `ProviderManager`, tool
//! registry and `AgentRuntime`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use wingman_agent::{
    register_delegation_tools, AgentRuntime, RuntimeSettings, TurnReply, TurnRequest,
};
use wingman_config::model::PolicyOverride;
use wingman_core::{ProviderAdapter, WingmanError};
use wingman_memory::{register_memory_tools, MemoryStore};
use wingman_provider::{FailoverSettings, ProviderManager};
use wingman_resilience::RateLimiter;
use wingman_session::{FileSessionStore, SessionManager};
use wingman_skill::{register_builtins, Sandbox, Tool, ToolRegistry};

use crate::mock_provider::{MockProvider, MockReply};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    provider: MockProvider,
    script: Vec<MockReply>,
    fallbacks: Vec<Arc<dyn ProviderAdapter>>,
    tools: Vec<Arc<dyn Tool>>,
    builtins: bool,
    memory_tools: bool,
    delegation: bool,
    tools_enabled: bool,
    overrides: BTreeMap<String, PolicyOverride>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            provider: MockProvider::new(),
            script: Vec::new(),
            fallbacks: Vec::new(),
            tools: Vec::new(),
            builtins: false,
            memory_tools: false,
            delegation: false,
            tools_enabled: true,
            overrides: BTreeMap::new(),
        }
    }

    /// Text replies returned in order by the primary mock provider.
    pub fn with_mock_responses<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.extend(responses.into_iter().map(MockReply::text));
        self
    }

    pub fn with_reply(mut self, reply: MockReply) -> Self {
        self.script.push(reply);
        self
    }

    /// Replaces the primary provider.
    pub fn with_provider(mut self, provider: MockProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Adds a provider tried after the primary one.
    pub fn with_fallback(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.fallbacks.push(provider);
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Registers the built-in shell, file and HTTP tools.
    pub fn with_builtins(mut self) -> Self {
        self.builtins = true;
        self
    }

    pub fn with_memory_tools(mut self) -> Self {
        self.memory_tools = true;
        self
    }

    /// Registers the `sessions_*` sub-agent tools.
    pub fn with_delegation(mut self) -> Self {
        self.delegation = true;
        self
    }

    /// Stops offering tool definitions to the model.
    pub fn without_tools(mut self) -> Self {
        self.tools_enabled = false;
        self
    }

    pub fn with_policy_override(mut self, kind: &str, over: PolicyOverride) -> Self {
        self.overrides.insert(kind.to_string(), over);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, WingmanError> {
        let workspace = tempfile::TempDir::new().map_err(WingmanError::storage)?;
        let memory = Arc::new(MemoryStore::new(workspace.path()));
        memory.ensure_workspace().await?;

        for reply in self.script {
            self.provider.push(reply).await;
        }
        let provider = Arc::new(self.provider);

        let mut providers = vec![provider.clone() as Arc<dyn ProviderAdapter>];
        providers.extend(self.fallbacks);
        let settings = FailoverSettings {
            max_attempts: 1,
            backoff_base: Duration::from_millis(1),
            ..FailoverSettings::default()
        };
        let providers = Arc::new(ProviderManager::new(
            providers,
            None,
            Arc::new(RateLimiter::new()),
            settings,
        )?);

        let mut registry = ToolRegistry::new();
        if self.builtins {
            register_builtins(&mut registry, &Sandbox::new(workspace.path()), &[]);
        }
        if self.memory_tools {
            register_memory_tools(&mut registry, memory);
        }
        let delegation = self
            .delegation
            .then(|| register_delegation_tools(&mut registry, &[]));
        for tool in self.tools {
            registry.register(tool);
        }
        let tools = Arc::new(registry);

        let store = Arc::new(FileSessionStore::new(workspace.path().join("sessions")));
        let sessions = Arc::new(SessionManager::with_overrides(store, self.overrides));

        let settings = RuntimeSettings {
            model: "mock-model".into(),
            tools_enabled: self.tools_enabled,
            ..RuntimeSettings::default()
        };
        let runtime = Arc::new(AgentRuntime::new(
            sessions.clone(),
            providers.clone(),
            tools.clone(),
            workspace.path(),
            settings,
        ));
        if let Some(delegation) = delegation {
            delegation.attach(&runtime);
        }

        Ok(TestHarness {
            provider,
            providers,
            sessions,
            tools,
            runtime,
            _workspace: workspace,
        })
    }
}

/// A complete agent stack over a temp workspace.
pub struct TestHarness {
    /// The primary scripted provider.
    pub provider: Arc<MockProvider>,
    pub providers: Arc<ProviderManager>,
    pub sessions: Arc<SessionManager>,
    pub tools: Arc<ToolRegistry>,
    pub runtime: Arc<AgentRuntime>,
    /// Kept alive so the workspace is removed on drop.
    _workspace: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn workspace(&self) -> &Path {
        self._workspace.path()
    }

    /// Runs one turn on `channel` with no user or group.
    pub async fn send_message(&self, channel: &str, text: &str) -> TurnReply {
        self.runtime
            .process_message(TurnRequest::new(channel, text), None)
            .await
    }

    /// Runs one turn from `user_id` inside `group_id`.
    pub async fn send_group_message(
        &self,
        channel: &str,
        user_id: &str,
        group_id: &str,
        text: &str,
    ) -> TurnReply {
        let request = TurnRequest {
            user_id: Some(user_id.to_string()),
            group_id: Some(group_id.to_string()),
            ..TurnRequest::new(channel, text)
        };
        self.runtime.process_message(request, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_answers_from_script() {
        let harness = TestHarness::builder()
            .with_mock_responses(["hello back"])
            .build()
            .await
            .unwrap();

        let reply = harness.send_message("cli", "hello").await;

        assert_eq!(reply.session_id, "main");
        assert_eq!(reply.outcome.text(), "hello back");
        assert!(harness.workspace().join("SOUL.md").exists());
    }
}
