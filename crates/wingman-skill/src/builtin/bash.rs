// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shell command execution via `bash -c`.
//!
//! Which sessions may call this is decided by session policy. Commands are
//! screened by the [`Sandbox`] and run in its root, scoped to the caller.

use async_trait::async_trait;
use serde_json::Value;
use wingman_core::WingmanError;

use crate::sandbox::{Sandbox, ToolContext};
use crate::tool::{required_str, Tool, ToolOutput};

/// Executes bash commands and returns stdout/stderr.
pub struct BashTool {
    sandbox: Sandbox,
}

impl BashTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command and return stdout/stderr"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                }
            },
            "required": ["command"]
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
        let command = required_str(&input, "command")?;
        let sandbox = self.sandbox.scoped(ctx);
        sandbox.check_command(command)?;

        let workdir = sandbox.root();
        tokio::fs::create_dir_all(workdir)
            .await
            .map_err(|e| WingmanError::Tool {
                message: format!("failed to prepare working directory '{}': {e}", workdir.display()),
                source: Some(Box::new(e)),
            })?;

        let mut cmd = tokio::process::Command::new("bash");
        cmd.arg("-c")
            .arg(command)
            .current_dir(workdir)
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| WingmanError::Tool {
            message: format!("failed to execute bash command: {e}"),
            source: Some(Box::new(e)),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            return Ok(ToolOutput::error(format!(
                "Exit code: {exit_code}\nstdout:\n{stdout}\nstderr:\n{stderr}"
            )));
        }

        let content = match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => "(no output)".to_string(),
            (_, true) => stdout.into_owned(),
            _ => format!("{stdout}\nstderr:\n{stderr}"),
        };
        Ok(ToolOutput::ok(content))
    }
}
