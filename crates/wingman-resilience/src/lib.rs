// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives: keyed rate limiting (token bucket and sliding
//! window) and a consecutive-failure circuit breaker.
//!
//! All timing goes through `tokio::time`, so tests can run on a paused clock.

pub mod circuit_breaker;
pub mod limiter;
pub mod sliding_window;
pub mod token_bucket;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use limiter::{RateLimitRule, RateLimitStats, RateLimitStrategy, RateLimiter};
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;
