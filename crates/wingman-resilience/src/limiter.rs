// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed rate limiter.
//!
//! Each key owns one budget behind its own `tokio::sync::Mutex`. A waiter
//! holds that mutex across its sleep, so callers on the same key are granted
//! strictly one after another and never double-spend a slot. Keys without a
//! configured budget pass straight through.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use strum::{Display, EnumString};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use wingman_config::model::RateLimitEntry;
use wingman_core::WingmanError;

use crate::sliding_window::SlidingWindow;
use crate::token_bucket::TokenBucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RateLimitStrategy {
    TokenBucket,
    SlidingWindow,
}

/// Budget definition for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitRule {
    pub strategy: RateLimitStrategy,
    pub max_requests: u32,
    pub window: Duration,
    /// Token bucket capacity; defaults to `max_requests`.
    pub burst: Option<u32>,
}

impl RateLimitRule {
    pub fn token_bucket(max_requests: u32, window: Duration) -> Self {
        Self {
            strategy: RateLimitStrategy::TokenBucket,
            max_requests,
            window,
            burst: None,
        }
    }

    pub fn sliding_window(max_requests: u32, window: Duration) -> Self {
        Self {
            strategy: RateLimitStrategy::SlidingWindow,
            max_requests,
            window,
            burst: None,
        }
    }
}

/// Point-in-time view of a key's budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitStats {
    pub key: String,
    pub strategy: RateLimitStrategy,
    pub capacity: u32,
    pub available: f64,
}

#[derive(Debug)]
enum Budget {
    Bucket(TokenBucket),
    Window(SlidingWindow),
}

impl Budget {
    fn from_rule(rule: &RateLimitRule) -> Self {
        match rule.strategy {
            RateLimitStrategy::TokenBucket => {
                let capacity = rule.burst.unwrap_or(rule.max_requests).max(1);
                let window = rule.window.as_secs_f64().max(f64::EPSILON);
                Budget::Bucket(TokenBucket::new(capacity, f64::from(capacity) / window))
            }
            RateLimitStrategy::SlidingWindow => {
                Budget::Window(SlidingWindow::new(rule.max_requests.max(1), rule.window))
            }
        }
    }

    fn capacity(&self) -> u32 {
        match self {
            Budget::Bucket(b) => b.capacity(),
            Budget::Window(w) => w.max_requests(),
        }
    }

    fn try_take(&mut self, tokens: u32, now: Instant) -> Result<(), Duration> {
        match self {
            Budget::Bucket(b) => b.try_consume(tokens, now),
            Budget::Window(w) => w.try_acquire(tokens, now),
        }
    }
}

#[derive(Debug)]
struct KeyedBudget {
    strategy: RateLimitStrategy,
    budget: Mutex<Budget>,
}

/// Keyed collection of request budgets.
#[derive(Debug, Default)]
pub struct RateLimiter {
    budgets: DashMap<String, Arc<KeyedBudget>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a limiter from `[[rate_limit.limits]]` entries. Entries with an
    /// unknown strategy are skipped with a warning.
    pub fn from_config(entries: &[RateLimitEntry]) -> Self {
        let limiter = Self::new();
        for entry in entries {
            let Ok(strategy) = RateLimitStrategy::from_str(&entry.strategy) else {
                warn!(key = %entry.key, strategy = %entry.strategy, "unknown rate limit strategy, skipping");
                continue;
            };
            limiter.configure(
                &entry.key,
                RateLimitRule {
                    strategy,
                    max_requests: entry.max_requests,
                    window: Duration::from_secs_f64(entry.window_secs.max(0.001)),
                    burst: entry.burst,
                },
            );
        }
        limiter
    }

    /// Installs or replaces the budget for `key`. Replacing resets it.
    pub fn configure(&self, key: &str, rule: RateLimitRule) {
        let keyed = KeyedBudget {
            strategy: rule.strategy,
            budget: Mutex::new(Budget::from_rule(&rule)),
        };
        self.budgets.insert(key.to_string(), Arc::new(keyed));
    }

    pub fn is_configured(&self, key: &str) -> bool {
        self.budgets.contains_key(key)
    }

    /// Suspends until `tokens` are granted for `key` and returns how long
    /// the caller waited.
    ///
    /// Fails only when the request can never fit the budget.
    pub async fn acquire(&self, key: &str, tokens: u32) -> Result<Duration, WingmanError> {
        let Some(keyed) = self.budgets.get(key).map(|b| b.value().clone()) else {
            return Ok(Duration::ZERO);
        };

        let mut budget = keyed.budget.lock().await;
        let capacity = budget.capacity();
        if tokens > capacity {
            return Err(WingmanError::Config(format!(
                "rate limit `{key}` cannot grant {tokens} tokens (capacity {capacity})"
            )));
        }

        let start = Instant::now();
        loop {
            match budget.try_take(tokens, Instant::now()) {
                Ok(()) => {
                    let waited = start.elapsed();
                    if !waited.is_zero() {
                        debug!(key, waited_ms = waited.as_millis() as u64, "rate limit wait");
                    }
                    return Ok(waited);
                }
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Takes one slot without waiting. Unconfigured keys always succeed;
    /// a key whose budget is busy with a waiter reports no capacity.
    pub fn try_acquire(&self, key: &str) -> bool {
        let Some(keyed) = self.budgets.get(key).map(|b| b.value().clone()) else {
            return true;
        };
        match keyed.budget.try_lock() {
            Ok(mut budget) => budget.try_take(1, Instant::now()).is_ok(),
            Err(_) => false,
        }
    }

    /// Current budget for `key`, or `None` if it is unconfigured.
    pub async fn stats(&self, key: &str) -> Option<RateLimitStats> {
        let keyed = self.budgets.get(key).map(|b| b.value().clone())?;
        let mut budget = keyed.budget.lock().await;
        let now = Instant::now();
        let available = match &mut *budget {
            Budget::Bucket(b) => b.available(now),
            Budget::Window(w) => w.remaining(now) as f64,
        };
        Some(RateLimitStats {
            key: key.to_string(),
            strategy: keyed.strategy,
            capacity: budget.capacity(),
            available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn token_bucket_spaces_acquires_by_refill_period() {
        let limiter = RateLimiter::new();
        limiter.configure("api", RateLimitRule::token_bucket(1, Duration::from_secs(1)));

        let start = Instant::now();
        assert_eq!(limiter.acquire("api", 1).await.unwrap(), Duration::ZERO);
        limiter.acquire("api", 1).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(990), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1100), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn sliding_window_waits_for_oldest() {
        let limiter = RateLimiter::new();
        limiter.configure("w", RateLimitRule::sliding_window(2, Duration::from_secs(10)));

        let start = Instant::now();
        limiter.acquire("w", 1).await.unwrap();
        limiter.acquire("w", 1).await.unwrap();
        limiter.acquire("w", 1).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_never_share_a_slot() {
        let limiter = Arc::new(RateLimiter::new());
        limiter.configure("k", RateLimitRule::token_bucket(1, Duration::from_secs(1)));

        let start = Instant::now();
        let mut tasks = Vec::new();
        for _ in 0..3 {
            let l = limiter.clone();
            tasks.push(tokio::spawn(async move {
                l.acquire("k", 1).await.unwrap();
                Instant::now()
            }));
        }
        let mut grants = Vec::new();
        for t in tasks {
            grants.push(t.await.unwrap().duration_since(start));
        }
        grants.sort();
        assert!(grants[1] >= Duration::from_millis(990));
        assert!(grants[2] >= Duration::from_millis(1990));
    }

    #[tokio::test]
    async fn unconfigured_key_passes_through() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.acquire("nothing", 5).await.unwrap(), Duration::ZERO);
        assert!(limiter.try_acquire("nothing"));
        assert!(limiter.stats("nothing").await.is_none());
    }

    #[tokio::test]
    async fn oversized_request_is_rejected() {
        let limiter = RateLimiter::new();
        limiter.configure("small", RateLimitRule::token_bucket(2, Duration::from_secs(1)));
        assert!(limiter.acquire("small", 3).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn try_acquire_and_stats() {
        let limiter = RateLimiter::new();
        limiter.configure(
            "b",
            RateLimitRule {
                burst: Some(2),
                ..RateLimitRule::token_bucket(10, Duration::from_secs(60))
            },
        );
        assert!(limiter.try_acquire("b"));
        assert!(limiter.try_acquire("b"));
        assert!(!limiter.try_acquire("b"));

        let stats = limiter.stats("b").await.unwrap();
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.strategy, RateLimitStrategy::TokenBucket);
        assert!(stats.available < 1.0);
    }

    #[test]
    fn from_config_skips_unknown_strategy() {
        let entries = vec![
            RateLimitEntry {
                key: "provider:a".into(),
                strategy: "sliding_window".into(),
                max_requests: 5,
                window_secs: 1.0,
                burst: None,
            },
            RateLimitEntry {
                key: "provider:b".into(),
                strategy: "leaky".into(),
                max_requests: 5,
                window_secs: 1.0,
                burst: None,
            },
        ];
        let limiter = RateLimiter::from_config(&entries);
        assert!(limiter.is_configured("provider:a"));
        assert!(!limiter.is_configured("provider:b"));
    }
}
