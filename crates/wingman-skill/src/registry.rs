// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool registry and dispatch.
//!
//! [`ToolRegistry::execute`] is total: unknown tools, argument errors,
//! panics and timeouts all come back as text the model can read, so a bad
//! tool call never aborts a turn.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};
use wingman_core::{ToolCall, ToolDefinition, WingmanError};

use crate::sandbox::ToolContext;
use crate::tool::{FnTool, Tool, ToolOutput};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_RESULT_CHARS: usize = 50_000;

/// Registry of available tools, indexed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
    max_result_chars: usize,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_TIMEOUT, DEFAULT_MAX_RESULT_CHARS)
    }

    pub fn with_limits(timeout: Duration, max_result_chars: usize) -> Self {
        Self {
            tools: HashMap::new(),
            timeout,
            max_result_chars,
        }
    }

    /// Registers a tool under its `name()`, replacing any previous holder.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "tool re-registered, previous definition replaced");
        }
    }

    /// Registers an async closure as a tool.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, WingmanError>> + Send + 'static,
    {
        self.register(Arc::new(FnTool::new(name, description, schema, handler)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// (name, description) pairs, sorted by name.
    pub fn list(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }

    /// Definitions of every tool for which `allow` returns true, sorted by name.
    pub fn definitions(&self, allow: impl Fn(&str) -> bool) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| allow(t.name()))
            .map(|t| t.definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Runs one tool call and renders its outcome as text.
    pub async fn execute(&self, call: &ToolCall) -> String {
        self.run(call, &ToolContext::default()).await.content
    }

    /// Runs one tool call within `ctx`. Unknown tools, timeouts, panics,
    /// errors and outputs the tool itself flagged as failed all come back
    /// with `is_error` set.
    pub async fn run(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutput {
        let name = call.name.as_str();
        let Some(tool) = self.get(name) else {
            return ToolOutput::error(format!(
                "❌ Unknown tool: {name}. Available: [{}]",
                self.names().join(", ")
            ));
        };

        metrics::counter!("wingman_tool_invocations_total", "tool" => name.to_string())
            .increment(1);
        debug!(tool = %name, call_id = %call.id, "executing tool");

        let invocation =
            AssertUnwindSafe(tool.invoke_with(call.arguments.clone(), ctx)).catch_unwind();
        let output = match tokio::time::timeout(self.timeout, invocation).await {
            Err(_) => {
                warn!(tool = %name, timeout_secs = self.timeout.as_secs(), "tool timed out");
                ToolOutput::error(format!(
                    "❌ Tool '{name}' timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
            Ok(Err(_panic)) => {
                warn!(tool = %name, "tool panicked");
                ToolOutput::error(format!("❌ Tool '{name}' failed: tool panicked"))
            }
            Ok(Ok(Err(e))) => {
                warn!(tool = %name, error = %e, "tool failed");
                ToolOutput::error(format!("❌ Tool '{name}' failed: {e}"))
            }
            Ok(Ok(Ok(output))) => output,
        };
        if output.is_error {
            metrics::counter!("wingman_tool_failures_total", "tool" => name.to_string())
                .increment(1);
        }

        ToolOutput {
            content: truncate_result(output.content, self.max_result_chars),
            is_error: output.is_error,
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Cuts `content` to `max_chars` characters and appends a truncation marker.
pub fn truncate_result(content: String, max_chars: usize) -> String {
    let total = content.chars().count();
    if total <= max_chars {
        return content;
    }
    let mut cut: String = content.chars().take(max_chars).collect();
    cut.push_str(&format!("\n... (truncated, {total} total chars)"));
    cut
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input back"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            })
        }

        async fn invoke(&self, input: Value) -> Result<ToolOutput, WingmanError> {
            let message = crate::tool::required_str(&input, "message")?;
            Ok(ToolOutput::ok(message))
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn executes_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let out = registry.execute(&call("echo", json!({"message": "hi"}))).await;
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn unknown_tool_lists_available() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let out = registry.execute(&call("teleport", json!({}))).await;
        assert_eq!(out, "❌ Unknown tool: teleport. Available: [echo]");
    }

    #[tokio::test]
    async fn tool_error_becomes_text() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let out = registry.execute(&call("echo", json!({}))).await;
        assert_eq!(
            out,
            "❌ Tool 'echo' failed: tool error: missing required 'message' parameter"
        );
    }

    #[tokio::test]
    async fn is_error_output_is_passed_through() {
        let mut registry = ToolRegistry::new();
        registry.register_fn("flaky", "Always reports failure", json!({"type": "object"}), |_| async {
            Ok(ToolOutput::error("Exit code: 2"))
        });
        let ctx = ToolContext::default();
        let out = registry.run(&call("flaky", json!({})), &ctx).await;
        assert_eq!(out.content, "Exit code: 2");
        assert!(out.is_error);

        let unknown = registry.run(&call("teleport", json!({})), &ctx).await;
        assert!(unknown.is_error);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let mut registry = ToolRegistry::with_limits(Duration::from_secs(2), 100);
        registry.register_fn("sleepy", "Sleeps", json!({"type": "object"}), |_| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(ToolOutput::ok("done"))
        });
        let out = registry.execute(&call("sleepy", json!({}))).await;
        assert_eq!(out, "❌ Tool 'sleepy' timed out after 2s");
    }

    #[tokio::test]
    async fn panicking_tool_is_contained() {
        let mut registry = ToolRegistry::new();
        registry.register_fn("boom", "Panics", json!({"type": "object"}), |_| async {
            if true {
                panic!("kaboom");
            }
            Ok(ToolOutput::ok("unreachable"))
        });
        let out = registry.execute(&call("boom", json!({}))).await;
        assert!(out.starts_with("❌ Tool 'boom' failed"));
    }

    #[tokio::test]
    async fn long_results_are_truncated() {
        let mut registry = ToolRegistry::with_limits(DEFAULT_TIMEOUT, 10);
        registry.register_fn("big", "Large output", json!({"type": "object"}), |_| async {
            Ok(ToolOutput::ok("é".repeat(25)))
        });
        let out = registry.execute(&call("big", json!({}))).await;
        assert_eq!(out, format!("{}\n... (truncated, 25 total chars)", "é".repeat(10)));
    }

    #[test]
    fn definitions_respect_filter_and_sort() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register_fn("bash", "Shell", json!({"type": "object"}), |_| async {
            Ok(ToolOutput::ok(""))
        });
        registry.register_fn("add", "Adds", json!({"type": "object"}), |_| async {
            Ok(ToolOutput::ok(""))
        });

        let all: Vec<String> = registry.definitions(|_| true).into_iter().map(|d| d.name).collect();
        assert_eq!(all, ["add", "bash", "echo"]);

        let filtered: Vec<String> = registry
            .definitions(|name| name != "bash")
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(filtered, ["add", "echo"]);
        assert_eq!(registry.list()[0], ("add", "Adds"));
    }
}
