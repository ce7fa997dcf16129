// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only JSONL transcripts, one file per session.
//!
//! Each line is a [`TranscriptEvent`]. Write failures are logged and
//! swallowed: a transcript is an audit trail, never a reason to fail a turn.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tokio::sync::Mutex;
use tracing::warn;
use wingman_core::WingmanError;
use wingman_session::storage_stem;

use crate::workspace::{append_to, read_or_empty};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TranscriptEventType {
    UserMessage,
    AssistantMessage,
    ToolCall,
    ToolResult,
    Error,
}

/// One transcript line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: TranscriptEventType,
    pub session_id: String,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Writes transcript events under `{workspace}/transcripts/`.
///
/// Appends go through a single lock so concurrent writers never
/// interleave partial lines.
#[derive(Debug)]
pub struct TranscriptLogger {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl TranscriptLogger {
    pub fn new(workspace: &Path) -> Self {
        Self {
            dir: workspace.join("transcripts"),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", storage_stem(session_id)))
    }

    pub async fn log_user_message(&self, session_id: &str, message: &str, channel: &str) {
        self.write(
            session_id,
            TranscriptEventType::UserMessage,
            Value::String(message.to_string()),
            Some(serde_json::json!({ "channel": channel })),
        )
        .await;
    }

    pub async fn log_assistant_message(&self, session_id: &str, message: &str, model: &str) {
        self.write(
            session_id,
            TranscriptEventType::AssistantMessage,
            Value::String(message.to_string()),
            Some(serde_json::json!({ "model": model })),
        )
        .await;
    }

    pub async fn log_tool_call(&self, session_id: &str, name: &str, arguments: &Value) {
        self.write(
            session_id,
            TranscriptEventType::ToolCall,
            serde_json::json!({ "name": name, "arguments": arguments }),
            None,
        )
        .await;
    }

    pub async fn log_tool_result(&self, session_id: &str, name: &str, result: &str, success: bool) {
        self.write(
            session_id,
            TranscriptEventType::ToolResult,
            serde_json::json!({ "name": name, "result": result, "success": success }),
            None,
        )
        .await;
    }

    pub async fn log_error(&self, session_id: &str, error: &str, context: &str) {
        self.write(
            session_id,
            TranscriptEventType::Error,
            Value::String(error.to_string()),
            Some(serde_json::json!({ "context": context })),
        )
        .await;
    }

    async fn write(
        &self,
        session_id: &str,
        event_type: TranscriptEventType,
        content: Value,
        metadata: Option<Value>,
    ) {
        let event = TranscriptEvent {
            timestamp: Utc::now(),
            event_type,
            session_id: session_id.to_string(),
            content,
            metadata,
        };
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(session_id, error = %e, "failed to encode transcript event (non-fatal)");
                return;
            }
        };
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Err(e) = append_to(&self.path_for(session_id), &line).await {
            warn!(session_id, error = %e, "failed to write transcript (non-fatal)");
        }
    }

    /// Every parseable event for a session. Corrupt lines are skipped.
    pub async fn read(&self, session_id: &str) -> Result<Vec<TranscriptEvent>, WingmanError> {
        let raw = read_or_empty(&self.path_for(session_id)).await?;
        Ok(raw
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }

    /// The most recent `count` events.
    pub async fn recent(
        &self,
        session_id: &str,
        count: usize,
    ) -> Result<Vec<TranscriptEvent>, WingmanError> {
        let mut events = self.read(session_id).await?;
        let start = events.len().saturating_sub(count);
        Ok(events.split_off(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_round_trip_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = TranscriptLogger::new(dir.path());
        log.log_user_message("s1", "hi", "cli").await;
        log.log_tool_call("s1", "bash", &serde_json::json!({"command": "ls"}))
            .await;
        log.log_tool_result("s1", "bash", "a.txt", true).await;
        log.log_assistant_message("s1", "done", "gpt-4o").await;

        let events = log.read("s1").await.unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            [
                TranscriptEventType::UserMessage,
                TranscriptEventType::ToolCall,
                TranscriptEventType::ToolResult,
                TranscriptEventType::AssistantMessage,
            ]
        );
        assert_eq!(events[0].metadata, Some(serde_json::json!({"channel": "cli"})));
        assert_eq!(events[1].content["name"], "bash");
        assert!(events[1].metadata.is_none());
    }

    #[tokio::test]
    async fn lines_use_type_field_and_skip_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let log = TranscriptLogger::new(dir.path());
        log.log_error("s2", "boom", "llm").await;

        let path = log.path_for("s2");
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"type\":\"error\""));

        std::fs::write(&path, format!("{raw}not json\n")).unwrap();
        log.log_error("s2", "again", "llm").await;
        assert_eq!(log.read("s2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn recent_returns_tail() {
        let dir = tempfile::tempdir().unwrap();
        let log = TranscriptLogger::new(dir.path());
        for i in 0..4 {
            log.log_user_message("s3", &format!("m{i}"), "cli").await;
        }
        let recent = log.recent("s3", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].content, "m3");
        assert!(log.read("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsafe_ids_stay_inside_transcripts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log = TranscriptLogger::new(dir.path());
        let path = log.path_for("discord:group:../../x");
        assert!(path.starts_with(dir.path().join("transcripts")));
    }
}
