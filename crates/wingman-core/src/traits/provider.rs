// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM backends.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::WingmanError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ModelInfo, ProviderRequest, ProviderResponse, ProviderStreamChunk};

/// A boxed stream of reply chunks.
pub type ProviderStream =
    Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, WingmanError>> + Send>>;

/// Adapter for LLM backends.
///
/// The method set is closed: the provider manager only ever calls these four
/// operations, so any backend that implements them can join a failover chain.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, WingmanError>;

    /// Sends a completion request and returns a stream of response chunks.
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, WingmanError>;

    /// Describes the model served by this adapter.
    fn model_info(&self) -> ModelInfo;
}
