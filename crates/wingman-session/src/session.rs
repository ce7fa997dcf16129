// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session record and its append-only message log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wingman_core::{ChatMessage, Role, ToolCall};

use crate::key::{SessionKey, SessionKind};
use crate::policy::SessionPolicy;

const WORKDIR_KEY: &str = "workdir";

/// One entry in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name, for tool-role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl SessionMessage {
    fn new(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            metadata: Map::new(),
        }
    }

    /// The provider-facing form of this message.
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            tool_call_id: self.tool_call_id.clone(),
            name: self.name.clone(),
        }
    }
}

/// A conversation: identity, security policy and ordered history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub kind: SessionKind,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
    pub policy: SessionPolicy,
    /// Free-form state owned by callers (project name, UI hints).
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_skill: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey, policy: SessionPolicy) -> Self {
        let now = Utc::now();
        Self {
            id: key.id,
            kind: key.kind,
            channel: key.channel,
            user_id: key.user_id,
            group_id: key.group_id,
            messages: Vec::new(),
            policy,
            context: Map::new(),
            active_skill: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a message and returns it.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) -> &SessionMessage {
        self.push(SessionMessage::new(role, content.into()))
    }

    /// Appends an assistant message carrying tool calls.
    pub fn add_tool_calls(
        &mut self,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> &SessionMessage {
        let mut message = SessionMessage::new(Role::Assistant, content.into());
        message.tool_calls = tool_calls;
        self.push(message)
    }

    /// Appends the result of one tool call.
    pub fn add_tool_result(
        &mut self,
        call_id: &str,
        tool_name: &str,
        content: impl Into<String>,
    ) -> &SessionMessage {
        let mut message = SessionMessage::new(Role::Tool, content.into());
        message.tool_call_id = Some(call_id.to_string());
        message.name = Some(tool_name.to_string());
        self.push(message)
    }

    fn push(&mut self, message: SessionMessage) -> &SessionMessage {
        self.updated_at = message.timestamp;
        let idx = self.messages.len();
        self.messages.push(message);
        &self.messages[idx]
    }

    pub fn is_tool_allowed(&self, tool: &str) -> bool {
        self.policy.is_tool_allowed(tool)
    }

    /// The last `limit` messages.
    pub fn recent_messages(&self, limit: usize) -> &[SessionMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    /// History window for a provider call.
    ///
    /// Leading tool results whose originating assistant message fell outside
    /// the window are dropped; providers reject orphaned tool messages.
    pub fn history(&self, limit: usize) -> Vec<ChatMessage> {
        self.recent_messages(limit)
            .iter()
            .skip_while(|m| m.role == Role::Tool)
            .map(SessionMessage::to_chat_message)
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Private working directory for tools when the policy isolates this
    /// session.
    pub fn workdir(&self) -> Option<&str> {
        self.context.get(WORKDIR_KEY).and_then(Value::as_str)
    }

    pub fn set_workdir(&mut self, dir: impl Into<String>) {
        self.context
            .insert(WORKDIR_KEY.to_string(), Value::String(dir.into()));
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
