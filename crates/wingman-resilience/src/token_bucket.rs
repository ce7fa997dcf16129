// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Continuously refilling token bucket.

use std::time::Duration;

use tokio::time::Instant;

/// Shortest suspension handed back to callers, so float rounding on the
/// refill never produces a zero-length sleep loop.
pub(crate) const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket holding `capacity` tokens, refilled at `refill_per_sec`.
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_sec,
            tokens: f64::from(capacity),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes `tokens` if available, otherwise reports how long until they are.
    pub fn try_consume(&mut self, tokens: u32, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        let wanted = f64::from(tokens);
        if self.tokens >= wanted {
            self.tokens -= wanted;
            return Ok(());
        }
        let missing = wanted - self.tokens;
        let wait = Duration::from_secs_f64(missing / self.refill_per_sec);
        Err(wait.max(MIN_WAIT))
    }

    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn drains_then_refills() {
        let mut bucket = TokenBucket::new(2, 1.0);
        let now = Instant::now();
        assert!(bucket.try_consume(1, now).is_ok());
        assert!(bucket.try_consume(1, now).is_ok());

        let wait = bucket.try_consume(1, now).unwrap_err();
        assert_eq!(wait, Duration::from_secs(1));

        let later = now + Duration::from_millis(500);
        let wait = bucket.try_consume(1, later).unwrap_err();
        assert_eq!(wait, Duration::from_millis(500));

        assert!(bucket.try_consume(1, now + Duration::from_secs(1)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_capacity() {
        let mut bucket = TokenBucket::new(3, 10.0);
        let now = Instant::now() + Duration::from_secs(60);
        assert_eq!(bucket.available(now), 3.0);
    }
}
