// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sliding-window request counter.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::token_bucket::MIN_WAIT;

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    max_requests: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests as usize,
            window,
            timestamps: VecDeque::with_capacity(max_requests as usize),
        }
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records `slots` requests at `now` if they fit, otherwise reports how
    /// long until enough old requests leave the window.
    pub fn try_acquire(&mut self, slots: u32, now: Instant) -> Result<(), Duration> {
        self.expire(now);
        let slots = slots as usize;
        if self.timestamps.len() + slots <= self.max_requests {
            self.timestamps.extend(std::iter::repeat_n(now, slots));
            return Ok(());
        }

        // The request fits once this many of the oldest entries have expired.
        let must_expire = self.timestamps.len() + slots - self.max_requests;
        let wait = self
            .timestamps
            .get(must_expire - 1)
            .map(|&t| (t + self.window).saturating_duration_since(now))
            .unwrap_or(self.window);
        Err(wait.max(MIN_WAIT))
    }

    pub fn remaining(&mut self, now: Instant) -> usize {
        self.expire(now);
        self.max_requests - self.timestamps.len()
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests as u32
    }
}
