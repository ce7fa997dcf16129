// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tools available without any plugin.

pub mod bash;
pub mod file;
pub mod http;

use std::sync::Arc;

pub use bash::BashTool;
pub use file::{ListDirTool, ReadFileTool, WriteFileTool};
pub use http::HttpFetchTool;

use crate::sandbox::Sandbox;
use crate::tool::Tool;
use crate::ToolRegistry;

/// Registers every built-in tool whose name is not in `disabled`.
/// File paths and shell commands go through `sandbox`.
pub fn register_builtins(registry: &mut ToolRegistry, sandbox: &Sandbox, disabled: &[String]) {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(BashTool::new(sandbox.clone())),
        Arc::new(ReadFileTool::new(sandbox.clone())),
        Arc::new(WriteFileTool::new(sandbox.clone())),
        Arc::new(ListDirTool::new(sandbox.clone())),
        Arc::new(HttpFetchTool::new()),
    ];
    for tool in tools {
        if !disabled.iter().any(|d| d == tool.name()) {
            registry.register(tool);
        }
    }
}
