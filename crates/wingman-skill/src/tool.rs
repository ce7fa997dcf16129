// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The [`Tool`] trait and a closure-backed implementation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wingman_core::{ToolDefinition, WingmanError};

use crate::sandbox::ToolContext;

/// Output from a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text handed back to the model.
    pub content: String,
    /// The tool ran but reports a failure (non-zero exit, HTTP 5xx).
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// A callable capability exposed to the model.
///
/// `invoke` receives the model-supplied JSON object. Returning `Err` means
/// the invocation itself broke; the registry turns it into text for the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used for lookup and in tool definitions.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema describing the tool's arguments.
    fn parameters_schema(&self) -> Value;

    async fn invoke(&self, input: Value) -> Result<ToolOutput, WingmanError>;

    /// Invokes on behalf of a session. Tools that touch the filesystem or
    /// need the caller's identity override this; the rest ignore `ctx`.
    async fn invoke_with(
        &self,
        input: Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, WingmanError> {
        self.invoke(input).await
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

type BoxedHandler = Arc<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<ToolOutput, WingmanError>> + Send>>
        + Send
        + Sync,
>;

/// A tool defined by a name, a schema and an async closure.
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    handler: BoxedHandler,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, WingmanError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(move |input| Box::pin(handler(input))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn invoke(&self, input: Value) -> Result<ToolOutput, WingmanError> {
        (self.handler)(input).await
    }
}

/// Pulls a required string argument out of a tool input.
pub fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, WingmanError> {
    input[key]
        .as_str()
        .ok_or_else(|| WingmanError::tool(format!("missing required '{key}' parameter")))
}
