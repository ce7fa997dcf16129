// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider management for the Wingman agent runtime.
//!
//! [`ProviderManager`] owns every configured backend and hides retries,
//! circuit breaking, rate limiting and failover behind a single `chat` call.

pub mod manager;
pub mod stats;

pub use manager::{FailoverSettings, ProviderManager};
pub use stats::{ProviderHealth, ProviderStats};
