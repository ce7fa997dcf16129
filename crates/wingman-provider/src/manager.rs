// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Priority-ordered provider failover.
//!
//! Providers are tried default-first, then in declaration order. Each gets
//! up to `max_attempts` tries with exponential backoff before the manager
//! moves on. A provider whose circuit breaker is open is skipped, unless
//! every breaker is open, in which case all of them are tried anyway.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wingman_config::WingmanConfig;
use wingman_core::{
    HealthStatus, ProviderAdapter, ProviderRequest, ProviderResponse, ProviderStream,
    WingmanError,
};
use wingman_openai::OpenAiProvider;
use wingman_resilience::{CircuitBreaker, RateLimiter};

use crate::stats::{ProviderHealth, ProviderStats};

/// Retry and timing knobs, normally taken from `[providers]` and `[agent]`.
#[derive(Debug, Clone)]
pub struct FailoverSettings {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    /// Applied when a request leaves `temperature` unset.
    pub temperature: f32,
    /// Applied when a request leaves `max_tokens` unset.
    pub max_tokens: u32,
}

impl Default for FailoverSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            request_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(5),
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

impl FailoverSettings {
    pub fn from_config(config: &WingmanConfig) -> Self {
        let p = &config.providers;
        Self {
            max_attempts: p.max_attempts.max(1),
            backoff_base: Duration::from_millis(p.backoff_base_ms),
            request_timeout: Duration::from_secs(p.request_timeout_secs),
            health_timeout: Duration::from_secs(p.health_timeout_secs),
            failure_threshold: p.failure_threshold,
            cooldown: Duration::from_secs(p.cooldown_secs),
            temperature: config.agent.temperature,
            max_tokens: config.agent.max_tokens,
        }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exp)
    }
}

struct EntryState {
    breaker: CircuitBreaker,
    stats: ProviderStats,
}

struct ProviderEntry {
    adapter: Arc<dyn ProviderAdapter>,
    state: Mutex<EntryState>,
}

impl ProviderEntry {
    fn name(&self) -> &str {
        self.adapter.name()
    }

    fn rate_key(&self) -> String {
        format!("provider:{}", self.name())
    }

    async fn allows_request(&self) -> bool {
        self.state.lock().await.breaker.allows_request()
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.breaker.record_success();
        state.stats.record_success();
        metrics::counter!("wingman_provider_requests_total", "provider" => self.name().to_string())
            .increment(1);
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.breaker.record_failure();
        state.stats.record_failure();
        metrics::counter!("wingman_provider_requests_total", "provider" => self.name().to_string())
            .increment(1);
        metrics::counter!("wingman_provider_failures_total", "provider" => self.name().to_string())
            .increment(1);
    }
}

/// Routes completions across the configured providers.
pub struct ProviderManager {
    entries: Vec<ProviderEntry>,
    limiter: Arc<RateLimiter>,
    settings: FailoverSettings,
}

impl ProviderManager {
    /// `providers` in declaration order; `default` is moved to the front.
    ///
    /// Fails when `providers` is empty or `default` names no provider.
    pub fn new(
        providers: Vec<Arc<dyn ProviderAdapter>>,
        default: Option<&str>,
        limiter: Arc<RateLimiter>,
        settings: FailoverSettings,
    ) -> Result<Self, WingmanError> {
        if providers.is_empty() {
            return Err(WingmanError::Config(
                "no LLM providers configured; add at least one [[providers.backends]] entry"
                    .into(),
            ));
        }

        let mut ordered = providers;
        if let Some(default) = default {
            let Some(pos) = ordered.iter().position(|p| p.name() == default) else {
                return Err(WingmanError::Config(format!(
                    "default provider '{default}' is not a configured backend"
                )));
            };
            let chosen = ordered.remove(pos);
            ordered.insert(0, chosen);
        }

        let entries = ordered
            .into_iter()
            .map(|adapter| ProviderEntry {
                adapter,
                state: Mutex::new(EntryState {
                    breaker: CircuitBreaker::new(settings.failure_threshold, settings.cooldown),
                    stats: ProviderStats::default(),
                }),
            })
            .collect();

        Ok(Self {
            entries,
            limiter,
            settings,
        })
    }

    /// Builds one OpenAI-compatible adapter per `[[providers.backends]]` entry.
    pub fn from_config(
        config: &WingmanConfig,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, WingmanError> {
        let settings = FailoverSettings::from_config(config);
        let providers = config
            .providers
            .backends
            .iter()
            .map(|backend| {
                OpenAiProvider::from_config(backend, settings.request_timeout)
                    .map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(
            providers,
            config.providers.default.as_deref(),
            limiter,
            settings,
        )
    }

    /// Provider names in priority order.
    pub fn provider_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn settings(&self) -> &FailoverSettings {
        &self.settings
    }

    fn fill_defaults(&self, mut request: ProviderRequest) -> ProviderRequest {
        request.temperature.get_or_insert(self.settings.temperature);
        request.max_tokens.get_or_insert(self.settings.max_tokens);
        request
    }

    async fn wait_for_budget(&self, entry: &ProviderEntry) {
        if let Err(e) = self.limiter.acquire(&entry.rate_key(), 1).await {
            warn!(
                provider = %entry.name(),
                error = %e,
                "rate limit misconfigured, sending anyway"
            );
        }
    }

    /// Sends `request` with retry and failover.
    ///
    /// Returns the first successful response, or
    /// [`WingmanError::ProvidersExhausted`] carrying the last failure.
    pub async fn chat(&self, request: ProviderRequest) -> Result<ProviderResponse, WingmanError> {
        let request = self.fill_defaults(request);

        let mut all_open = true;
        for entry in &self.entries {
            if entry.allows_request().await {
                all_open = false;
                break;
            }
        }
        if all_open {
            warn!("every provider circuit is open, trying all of them");
        }

        let mut tried = Vec::new();
        let mut last_error = String::from("no provider accepted the request");

        for (index, entry) in self.entries.iter().enumerate() {
            let name = entry.name();
            if !all_open && !entry.allows_request().await {
                debug!(provider = %name, "skipping provider with open circuit");
                continue;
            }
            tried.push(name.to_string());

            for attempt in 1..=self.settings.max_attempts {
                if attempt > 1 {
                    let backoff = self.settings.backoff(attempt - 1);
                    info!(
                        provider = %name,
                        attempt,
                        max_attempts = self.settings.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying provider after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }

                self.wait_for_budget(entry).await;
                let call = entry.adapter.complete(request.clone());
                let error = match tokio::time::timeout(self.settings.request_timeout, call).await {
                    Ok(Ok(response)) => {
                        entry.record_success().await;
                        if index > 0 || attempt > 1 {
                            info!(provider = %name, attempt, "provider failover succeeded");
                        }
                        return Ok(response);
                    }
                    Ok(Err(e)) => e,
                    Err(_) => WingmanError::Timeout {
                        duration: self.settings.request_timeout,
                    },
                };

                entry.record_failure().await;
                last_error = error.to_string();
                warn!(
                    provider = %name,
                    attempt,
                    max_attempts = self.settings.max_attempts,
                    error = %error,
                    "provider request failed"
                );
            }

            if index + 1 < self.entries.len() {
                warn!(provider = %name, "provider exhausted, trying fallback");
            }
        }

        warn!(tried = ?tried, last_error = %last_error, "all providers failed");
        Err(WingmanError::ProvidersExhausted { tried, last_error })
    }

    /// The first reachable provider in priority order.
    ///
    /// All probes run concurrently, each bounded by `health_timeout`. When
    /// nothing answers, the default provider is returned anyway.
    pub async fn healthy_provider(&self) -> Arc<dyn ProviderAdapter> {
        let index = self.healthy_index().await;
        self.entries[index].adapter.clone()
    }

    async fn healthy_index(&self) -> usize {
        let statuses = self.probe_all().await;
        for (index, (entry, status)) in self.entries.iter().zip(&statuses).enumerate() {
            if status.is_reachable() {
                debug!(provider = %entry.name(), "using healthy provider");
                return index;
            }
        }
        warn!("no healthy providers found, using default");
        // `new` rejects an empty provider list, so index 0 always exists.
        0
    }

    async fn probe_all(&self) -> Vec<HealthStatus> {
        let timeout = self.settings.health_timeout;
        let probes = self.entries.iter().map(|entry| async move {
            match tokio::time::timeout(timeout, entry.adapter.health_check()).await {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    warn!(provider = %entry.name(), error = %e, "health check error");
                    HealthStatus::Unhealthy(e.to_string())
                }
                Err(_) => {
                    warn!(provider = %entry.name(), "health check timed out");
                    HealthStatus::Unhealthy(format!("health check timed out after {timeout:?}"))
                }
            }
        });
        join_all(probes).await
    }

    /// Opens a streamed completion on the healthiest provider.
    ///
    /// No retries: a stream that has started cannot be replayed elsewhere.
    pub async fn chat_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderStream, WingmanError> {
        let request = self.fill_defaults(request);
        let entry = &self.entries[self.healthy_index().await];

        self.wait_for_budget(entry).await;
        let opened =
            tokio::time::timeout(self.settings.request_timeout, entry.adapter.stream(request))
                .await;
        match opened {
            Ok(Ok(stream)) => {
                entry.record_success().await;
                Ok(stream)
            }
            Ok(Err(e)) => {
                entry.record_failure().await;
                Err(e)
            }
            Err(_) => {
                entry.record_failure().await;
                Err(WingmanError::Timeout {
                    duration: self.settings.request_timeout,
                })
            }
        }
    }

    /// Probes every provider and pairs the result with its counters.
    pub async fn health_report(&self) -> Vec<ProviderHealth> {
        let statuses = self.probe_all().await;
        let mut report = Vec::with_capacity(self.entries.len());
        for (entry, status) in self.entries.iter().zip(statuses) {
            let state = entry.state.lock().await;
            report.push(ProviderHealth {
                name: entry.name().to_string(),
                status,
                circuit: state.breaker.state(),
                info: entry.adapter.model_info(),
                stats: state.stats,
                success_rate: state.stats.success_rate(),
            });
        }
        report
    }

    /// Usage counters in priority order.
    pub async fn stats(&self) -> Vec<(String, ProviderStats)> {
        let mut out = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            out.push((entry.name().to_string(), entry.state.lock().await.stats));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::StreamExt;
    use wingman_core::{
        AdapterType, ChatMessage, ModelInfo, PluginAdapter, ProviderStreamChunk,
    };
    use wingman_resilience::RateLimitRule;

    use super::*;

    /// Replays a script of outcomes, repeating the last one when exhausted.
    struct Scripted {
        name: String,
        script: std::sync::Mutex<VecDeque<Result<String, String>>>,
        last: Result<String, String>,
        healthy: bool,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &str, script: Vec<Result<&str, &str>>, healthy: bool) -> Arc<Self> {
            let script: VecDeque<_> = script
                .into_iter()
                .map(|r| r.map(String::from).map_err(String::from))
                .collect();
            let last = script.back().cloned().unwrap_or(Ok(String::new()));
            Arc::new(Self {
                name: name.into(),
                script: std::sync::Mutex::new(script),
                last,
                healthy,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PluginAdapter for Scripted {
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
            Ok(if self.healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("down".into())
            })
        }
    }

    #[async_trait]
    impl ProviderAdapter for Scripted {
        async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, WingmanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.last.clone());
            next.map(ProviderResponse::text)
                .map_err(WingmanError::provider)
        }

        async fn stream(&self, _: ProviderRequest) -> Result<ProviderStream, WingmanError> {
            let chunks = vec![Ok(ProviderStreamChunk {
                delta: format!("from {}", self.name),
                ..Default::default()
            })];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        fn model_info(&self) -> ModelInfo {
            ModelInfo {
                provider: self.name.clone(),
                model: "scripted".into(),
                context_window: 1000,
                supports_tools: true,
            }
        }
    }

    fn settings() -> FailoverSettings {
        FailoverSettings {
            max_attempts: 2,
            backoff_base: Duration::from_millis(100),
            ..FailoverSettings::default()
        }
    }

    fn manager(providers: Vec<Arc<Scripted>>, default: Option<&str>) -> ProviderManager {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn ProviderAdapter>)
            .collect();
        ProviderManager::new(providers, default, Arc::new(RateLimiter::new()), settings()).unwrap()
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            messages: vec![ChatMessage::user("hi")],
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_second_provider() {
        let a = Scripted::new("a", vec![Err("a is down")], true);
        let b = Scripted::new("b", vec![Ok("from b")], true);
        let mgr = manager(vec![a.clone(), b.clone()], None);

        let response = mgr.chat(request()).await.unwrap();
        assert_eq!(response.content, "from b");
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 1);

        let stats = mgr.stats().await;
        assert_eq!(stats[0].1.failures, 2);
        assert_eq!(stats[1].1.successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_same_provider_with_backoff() {
        let a = Scripted::new("a", vec![Err("blip"), Ok("recovered")], true);
        let mgr = manager(vec![a.clone()], None);

        let start = tokio::time::Instant::now();
        let response = mgr.chat(request()).await.unwrap();
        assert_eq!(response.content, "recovered");
        assert_eq!(a.calls(), 2);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_names_last_failure() {
        let a = Scripted::new("a", vec![Err("a broke")], true);
        let b = Scripted::new("b", vec![Err("b broke")], true);
        let mgr = manager(vec![a, b], None);

        let err = mgr.chat(request()).await.unwrap_err();
        match &err {
            WingmanError::ProvidersExhausted { tried, last_error } => {
                assert_eq!(tried, &["a".to_string(), "b".to_string()]);
                assert!(last_error.contains("b broke"));
            }
            other => panic!("expected ProvidersExhausted, got {other:?}"),
        }
        assert!(err.to_string().starts_with("All providers failed after retries."));
    }

    #[tokio::test(start_paused = true)]
    async fn default_provider_goes_first() {
        let a = Scripted::new("a", vec![Ok("from a")], true);
        let b = Scripted::new("b", vec![Ok("from b")], true);
        let mgr = manager(vec![a.clone(), b], Some("b"));

        assert_eq!(mgr.provider_names(), ["b", "a"]);
        assert_eq!(mgr.chat(request()).await.unwrap().content, "from b");
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn open_circuit_is_skipped_until_all_open() {
        let a = Scripted::new("a", vec![Err("down")], true);
        let b = Scripted::new("b", vec![Ok("from b")], true);
        let mut s = settings();
        s.failure_threshold = 2;
        let mgr = ProviderManager::new(
            vec![
                a.clone() as Arc<dyn ProviderAdapter>,
                b.clone() as Arc<dyn ProviderAdapter>,
            ],
            None,
            Arc::new(RateLimiter::new()),
            s,
        )
        .unwrap();

        // Two failures on `a` open its circuit.
        mgr.chat(request()).await.unwrap();
        assert_eq!(a.calls(), 2);
        mgr.chat(request()).await.unwrap();
        assert_eq!(a.calls(), 2, "open circuit must be skipped");

        let report = mgr.health_report().await;
        assert_eq!(report[0].circuit, wingman_resilience::CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_spaces_requests() {
        let a = Scripted::new("a", vec![Ok("ok")], true);
        let limiter = Arc::new(RateLimiter::new());
        limiter.configure(
            "provider:a",
            RateLimitRule::token_bucket(1, Duration::from_secs(1)),
        );
        let mgr = ProviderManager::new(
            vec![a as Arc<dyn ProviderAdapter>],
            None,
            limiter,
            settings(),
        )
        .unwrap();

        let start = tokio::time::Instant::now();
        mgr.chat(request()).await.unwrap();
        mgr.chat(request()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(990));
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_provider_prefers_reachable_then_default() {
        let a = Scripted::new("a", vec![Ok("")], false);
        let b = Scripted::new("b", vec![Ok("")], true);
        let mgr = manager(vec![a.clone(), b], None);
        assert_eq!(mgr.healthy_provider().await.name(), "b");

        let down = manager(vec![a], None);
        assert_eq!(down.healthy_provider().await.name(), "a");
    }

    #[tokio::test(start_paused = true)]
    async fn stream_uses_healthy_provider() {
        let a = Scripted::new("a", vec![Ok("")], false);
        let b = Scripted::new("b", vec![Ok("")], true);
        let mgr = manager(vec![a, b], None);

        let mut stream = mgr.chat_stream(request()).await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.delta, "from b");
    }

    #[test]
    fn rejects_empty_and_unknown_default() {
        let limiter = Arc::new(RateLimiter::new());
        assert!(
            ProviderManager::new(vec![], None, limiter.clone(), settings()).is_err()
        );
        let a = Scripted::new("a", vec![], true) as Arc<dyn ProviderAdapter>;
        assert!(ProviderManager::new(vec![a], Some("zzz"), limiter, settings()).is_err());
    }

    #[test]
    fn backoff_doubles() {
        let s = settings();
        assert_eq!(s.backoff(1), Duration::from_millis(100));
        assert_eq!(s.backoff(2), Duration::from_millis(200));
        assert_eq!(s.backoff(3), Duration::from_millis(400));
    }
}
