// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-provider usage counters and the health report shape.

use serde::Serialize;
use wingman_core::{HealthStatus, ModelInfo};
use wingman_resilience::CircuitState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProviderStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
}

impl ProviderStats {
    pub(crate) fn record_success(&mut self) {
        self.requests += 1;
        self.successes += 1;
        self.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&mut self) {
        self.requests += 1;
        self.failures += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Percentage of successful requests; 0 before the first request.
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.successes as f64 / self.requests as f64 * 100.0
        }
    }
}

/// One row of [`ProviderManager::health_report`](crate::ProviderManager::health_report).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub status: HealthStatus,
    pub circuit: CircuitState,
    pub info: ModelInfo,
    pub stats: ProviderStats,
    pub success_rate: f64,
}
