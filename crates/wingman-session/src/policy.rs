// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session security policy.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use wingman_config::model::PolicyOverride;

use crate::key::SessionKind;

/// How strongly tool side effects are contained for a session.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SandboxLevel {
    #[default]
    None,
    Restricted,
    Isolated,
}

/// Tool permissions and limits attached to a session at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    /// Empty means every tool not in `denied_tools`.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub denied_tools: Vec<String>,
    pub max_tool_iterations: u32,
    #[serde(default)]
    pub sandbox: SandboxLevel,
    #[serde(default)]
    pub require_approval: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            allowed_tools: Vec::new(),
            denied_tools: Vec::new(),
            max_tool_iterations: 25,
            sandbox: SandboxLevel::None,
            require_approval: false,
        }
    }
}

impl SessionPolicy {
    /// Built-in policy for each session kind.
    pub fn for_kind(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Main => Self {
                max_tool_iterations: 50,
                ..Self::default()
            },
            SessionKind::DirectMessage => Self {
                denied_tools: vec!["bash".into()],
                max_tool_iterations: 25,
                sandbox: SandboxLevel::Restricted,
                ..Self::default()
            },
            SessionKind::Group => Self {
                denied_tools: vec!["bash".into(), "write_file".into()],
                max_tool_iterations: 15,
                sandbox: SandboxLevel::Restricted,
                require_approval: true,
                ..Self::default()
            },
            SessionKind::Project => Self {
                max_tool_iterations: 100,
                sandbox: SandboxLevel::Isolated,
                ..Self::default()
            },
            SessionKind::Agent => Self {
                max_tool_iterations: 50,
                ..Self::default()
            },
        }
    }

    /// Replaces every field the override sets. Unknown sandbox names keep the
    /// current level; config validation rejects them before this point.
    pub fn with_override(mut self, over: &PolicyOverride) -> Self {
        if let Some(allowed) = &over.allowed_tools {
            self.allowed_tools = allowed.clone();
        }
        if let Some(denied) = &over.denied_tools {
            self.denied_tools = denied.clone();
        }
        if let Some(max) = over.max_tool_iterations {
            self.max_tool_iterations = max;
        }
        if let Some(sandbox) = over
            .sandbox
            .as_deref()
            .and_then(|s| SandboxLevel::from_str(s).ok())
        {
            self.sandbox = sandbox;
        }
        if let Some(approval) = over.require_approval {
            self.require_approval = approval;
        }
        self
    }

    /// Deny wins. An empty allow-list admits everything not denied; a
    /// non-empty one admits only its members.
    pub fn is_tool_allowed(&self, tool: &str) -> bool {
        if self.denied_tools.iter().any(|t| t == tool) {
            return false;
        }
        self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|t| t == tool)
    }
}
