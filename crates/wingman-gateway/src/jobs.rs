// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Busy latches for detached background jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// At most one job holds the latch at a time.
#[derive(Debug, Default)]
pub struct JobLatch {
    busy: AtomicBool,
}

impl JobLatch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims the latch, or returns `None` when a job already holds it.
    /// The latch is released when the guard drops, including on panic.
    pub fn try_claim(self: &Arc<Self>) -> Option<JobGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobGuard {
                latch: Arc::clone(self),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct JobGuard {
    latch: Arc<JobLatch>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.latch.busy.store(false, Ordering::Release);
    }
}
