// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted LLM providers for deterministic testing.
//!
//! [`MockProvider`] pops replies from a FIFO script and falls back to a
//! fixed reply once the script runs dry. [`FailingProvider`] fails every
//! call. Both count calls so tests can assert on model traffic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use tokio::sync::Mutex;
use wingman_core::{
    AdapterType, HealthStatus, ModelInfo, PluginAdapter, ProviderAdapter, ProviderRequest,
    ProviderResponse, ProviderStream, ProviderStreamChunk, ToolCall, WingmanError,
};

/// One scripted provider reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Text(String),
    /// Calls with an empty id get `call_{n}` assigned when replayed.
    ToolCalls(Vec<ToolCall>),
    Fail(String),
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        MockReply::Text(content.into())
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        MockReply::ToolCalls(vec![ToolCall {
            id: String::new(),
            name: name.into(),
            arguments,
        }])
    }

    pub fn fail(message: impl Into<String>) -> Self {
        MockReply::Fail(message.into())
    }
}

pub struct MockProvider {
    name: String,
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    stream_chunks: Vec<String>,
    health: HealthStatus,
    latency: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    /// An empty script answering "mock response".
    pub fn new() -> Self {
        Self {
            name: "mock-provider".into(),
            script: Mutex::new(VecDeque::new()),
            fallback: MockReply::text("mock response"),
            stream_chunks: Vec::new(),
            health: HealthStatus::Healthy,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Text replies returned in order.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        let script = responses.into_iter().map(MockReply::text).collect();
        Self {
            script: Mutex::new(script),
            ..provider
        }
    }

    /// Fails every call with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new().always(MockReply::fail(message))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reply used once the script is empty.
    pub fn always(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Chunks yielded by `stream`, in order.
    pub fn streaming<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream_chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// Delays every reply by `latency`, for tests that need a turn in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn unhealthy(mut self, reason: impl Into<String>) -> Self {
        self.health = HealthStatus::Unhealthy(reason.into());
        self
    }

    pub async fn push(&self, reply: MockReply) {
        self.script.lock().await.push_back(reply);
    }

    /// Number of `complete` and `stream` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().await.last().cloned()
    }

    async fn next_reply(&self, request: ProviderRequest) -> (usize, MockReply) {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().await.push(request);
        let reply = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (call, reply)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, WingmanError> {
        Ok(self.health.clone())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, WingmanError> {
        let (call, reply) = self.next_reply(request).await;
        match reply {
            MockReply::Text(content) => Ok(ProviderResponse::text(content)),
            MockReply::ToolCalls(calls) => {
                let tool_calls = calls
                    .into_iter()
                    .enumerate()
                    .map(|(i, mut tc)| {
                        if tc.id.is_empty() {
                            tc.id = format!("call_{call}_{i}");
                        }
                        tc
                    })
                    .collect();
                Ok(ProviderResponse {
                    tool_calls,
                    finish_reason: Some("tool_calls".into()),
                    ..ProviderResponse::default()
                })
            }
            MockReply::Fail(message) => Err(WingmanError::provider(message)),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, WingmanError> {
        let chunks = if self.stream_chunks.is_empty() {
            match self.next_reply(request).await.1 {
                MockReply::Text(content) => vec![content],
                MockReply::ToolCalls(_) => Vec::new(),
                MockReply::Fail(message) => return Err(WingmanError::provider(message)),
            }
        } else {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().await.push(request);
            self.stream_chunks.clone()
        };

        let last = chunks.len().saturating_sub(1);
        let items: Vec<Result<ProviderStreamChunk, WingmanError>> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, delta)| {
                Ok(ProviderStreamChunk {
                    delta,
                    finish_reason: (i == last).then(|| "stop".to_string()),
                    usage: None,
                })
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: self.name.clone(),
            model: "mock-model".into(),
            context_window: 8192,
            supports_tools: true,
        }
    }
}

/// A provider that is always down.
pub struct FailingProvider {
    name: String,
    message: String,
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> WingmanError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        WingmanError::provider(self.message.clone())
    }
}

#[async_trait]
impl PluginAdapter for FailingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, WingmanError> {
        Ok(HealthStatus::Unhealthy(self.message.clone()))
    }
}

#[async_trait]
impl ProviderAdapter for FailingProvider {
    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, WingmanError> {
        Err(self.fail())
    }

    async fn stream(&self, _request: ProviderRequest) -> Result<ProviderStream, WingmanError> {
        Err(self.fail())
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: self.name.clone(),
            model: "failing-model".into(),
            context_window: 8192,
            supports_tools: false,
        }
    }
}
