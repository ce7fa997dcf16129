// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Wingman agent runtime.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common message types used throughout the workspace. Provider backends and
//! session stores implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::WingmanError;
pub use types::{
    AdapterType, ChatMessage, HealthStatus, ModelInfo, ProviderRequest, ProviderResponse,
    ProviderStreamChunk, Role, TokenUsage, ToolCall, ToolDefinition,
};

pub use traits::{PluginAdapter, ProviderAdapter, ProviderStream};
