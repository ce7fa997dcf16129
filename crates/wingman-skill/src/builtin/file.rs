// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem tools: `read_file`, `write_file`, `list_dir`.
//!
//! Reading and writing are separate tools so session policy can deny
//! writes while still allowing reads. Every path goes through the
//! [`Sandbox`], scoped to the calling session.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use wingman_core::WingmanError;

use crate::sandbox::{Sandbox, ToolContext};
use crate::tool::{required_str, Tool, ToolOutput};

/// Maximum file read size in bytes (100KB).
const MAX_READ_SIZE: usize = 100 * 1024;

fn io_error(action: &str, path: &Path, e: std::io::Error) -> WingmanError {
    WingmanError::Tool {
        message: format!("failed to {action} '{}': {e}", path.display()),
        source: Some(Box::new(e)),
    }
}

/// Cuts `s` to at most `max` bytes on a char boundary.
fn floor_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub struct ReadFileTool {
    sandbox: Sandbox,
}

impl ReadFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file. Relative paths resolve against the workspace."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to read" }
            },
            "required": ["path"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<ToolOutput, WingmanError> {
        self.invoke_with(input, &ToolContext::default()).await
    }

    async fn invoke_with(
        &self,
        input: Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, WingmanError> {
        let path = self.sandbox.scoped(ctx).resolve(required_str(&input, "path")?)?;
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error("read file", &path, e))?;

        if contents.len() > MAX_READ_SIZE {
            return Ok(ToolOutput::ok(format!(
                "{}...\n\n[File truncated from {} to {} bytes]",
                floor_boundary(&contents, MAX_READ_SIZE),
                contents.len(),
                MAX_READ_SIZE
            )));
        }
        Ok(ToolOutput::ok(contents))
    }
}

pub struct WriteFileTool {
    sandbox: Sandbox,
}

impl WriteFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating parent directories. Set append to add to the end."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to write" },
                "content": { "type": "string", "description": "Text to write" },
                "append": { "type": "boolean", "default": false }
            },
            "required": ["path", "content"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<ToolOutput, WingmanError> {
        self.invoke_with(input, &ToolContext::default()).await
    }

    async fn invoke_with(
        &self,
        input: Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, WingmanError> {
        let path = self.sandbox.scoped(ctx).resolve(required_str(&input, "path")?)?;
        let content = required_str(&input, "content")?;
        let append = input["append"].as_bool().unwrap_or(false);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directory", parent, e))?;
        }

        if append {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| io_error("open file", &path, e))?;
            file.write_all(content.as_bytes())
                .await
                .map_err(|e| io_error("append to file", &path, e))?;
        } else {
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| io_error("write file", &path, e))?;
        }

        Ok(ToolOutput::ok(format!(
            "Successfully wrote {} bytes to '{}'",
            content.len(),
            path.display()
        )))
    }
}

pub struct ListDirTool {
    sandbox: Sandbox,
}

impl ListDirTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories end with '/'."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory to list", "default": "." }
            }
        })
    }

    async fn invoke(&self, input: Value) -> Result<ToolOutput, WingmanError> {
        self.invoke_with(input, &ToolContext::default()).await
    }

    async fn invoke_with(
        &self,
        input: Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, WingmanError> {
        let path = self
            .sandbox
            .scoped(ctx)
            .resolve(input["path"].as_str().unwrap_or("."))?;
        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| io_error("list directory", &path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("list directory", &path, e))?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();

        if names.is_empty() {
            return Ok(ToolOutput::ok("(empty directory)"));
        }
        Ok(ToolOutput::ok(names.join("\n")))
    }
}
