// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Wingman integration tests.
//!
//! Provides scripted providers and a harness that wires a full agent stack
//! over a temp workspace, for fast, deterministic tests without network
//! access.
//!
//! # Components
//!
//! - [`MockProvider`] - Provider replaying scripted replies
//! - [`FailingProvider`] - Provider that fails every call
//! - [`TestHarness`] - Complete runtime over a temp workspace

pub mod harness;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{FailingProvider, MockProvider, MockReply};
