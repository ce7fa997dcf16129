// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket wire frames.
//!
//! Every frame is a JSON object tagged by `type`. Clients may attach a
//! `request_id`; each frame sent in answer echoes it.
//!
//! Client -> Server:
//! ```json
//! {"type": "init", "session_id": "main", "room": "lobby"}
//! {"type": "message", "content": "hello", "request_id": "r-1"}
//! {"type": "ping"}
//! ```
//!
//! Server -> Client:
//! ```json
//! {"type": "thinking", "status": "Thinking (step 1)", "request_id": "r-1"}
//! {"type": "response", "content": "hi!", "session_id": "dm:webchat:...", "request_id": "r-1"}
//! {"type": "pong"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wingman_agent::AgentEvent;
use wingman_core::WingmanError;

use crate::project::ProjectState;

/// Frames accepted from clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Init {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        room: Option<String>,
    },
    Message {
        content: String,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        group_id: Option<String>,
        #[serde(default)]
        room: Option<String>,
    },
    Ping,
    ProjectCreate {
        name: String,
        prompt: String,
    },
    ProjectLoad {
        name: String,
    },
    ProjectList,
    ProjectNext {
        #[serde(default)]
        name: Option<String>,
    },
}

/// Frames sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Session {
        session_id: String,
        model: String,
        room: String,
    },
    Response {
        content: String,
        session_id: String,
    },
    Thinking {
        status: String,
    },
    ToolCall {
        name: String,
        arguments: Value,
        call_id: String,
    },
    ToolResult {
        name: String,
        result: String,
        call_id: String,
    },
    Error {
        content: String,
    },
    ProjectUpdate {
        project: ProjectState,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ProjectList {
        projects: Vec<String>,
    },
    Pong,
}

impl ServerFrame {
    pub fn error(content: impl Into<String>) -> Self {
        ServerFrame::Error {
            content: content.into(),
        }
    }

    /// The frame relayed to a room for an agent progress event. Turn start
    /// and completion have no frame; the `response` frame closes a turn.
    pub fn from_event(event: AgentEvent) -> Option<Self> {
        match event {
            AgentEvent::Thinking { status } => Some(ServerFrame::Thinking { status }),
            AgentEvent::ToolCall {
                call_id,
                name,
                arguments,
            } => Some(ServerFrame::ToolCall {
                name,
                arguments,
                call_id,
            }),
            AgentEvent::ToolResult {
                call_id,
                name,
                result,
            } => Some(ServerFrame::ToolResult {
                name,
                result,
                call_id,
            }),
            AgentEvent::Start { .. } | AgentEvent::Complete { .. } => None,
        }
    }

    /// Serializes the frame, echoing `request_id` when present.
    pub fn encode(&self, request_id: Option<&str>) -> String {
        #[derive(Serialize)]
        struct Envelope<'a> {
            #[serde(flatten)]
            frame: &'a ServerFrame,
            #[serde(skip_serializing_if = "Option::is_none")]
            request_id: Option<&'a str>,
        }

        serde_json::to_string(&Envelope {
            frame: self,
            request_id,
        })
        .unwrap_or_else(|e| {
            serde_json::json!({
                "type": "error",
                "content": format!("failed to encode frame: {e}"),
                "request_id": request_id,
            })
            .to_string()
        })
    }
}

/// A decoded client frame with its optional correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub request_id: Option<String>,
    pub frame: ClientFrame,
}

/// Decodes one text frame.
///
/// On failure the `request_id` is still returned when the text was a JSON
/// object carrying one, so the error frame can echo it.
pub fn decode(text: &str) -> Result<Inbound, (Option<String>, WingmanError)> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| (None, WingmanError::Protocol(format!("invalid JSON: {e}"))))?;

    let request_id = value
        .get("request_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    match serde_json::from_value::<ClientFrame>(value) {
        Ok(frame) => Ok(Inbound { request_id, frame }),
        Err(e) => Err((
            request_id,
            WingmanError::Protocol(format!("invalid frame: {e}")),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_message_with_request_id() {
        let inbound =
            decode(r#"{"type":"message","content":"hi","request_id":"r-1","room":"lobby"}"#)
                .unwrap();
        assert_eq!(inbound.request_id.as_deref(), Some("r-1"));
        assert_eq!(
            inbound.frame,
            ClientFrame::Message {
                content: "hi".into(),
                user_id: None,
                group_id: None,
                room: Some("lobby".into()),
            }
        );
    }

    #[test]
    fn decodes_unit_frames() {
        assert_eq!(decode(r#"{"type":"ping"}"#).unwrap().frame, ClientFrame::Ping);
        assert_eq!(
            decode(r#"{"type":"project_list"}"#).unwrap().frame,
            ClientFrame::ProjectList
        );
        assert_eq!(
            decode(r#"{"type":"project_next"}"#).unwrap().frame,
            ClientFrame::ProjectNext { name: None }
        );
    }

    #[test]
    fn malformed_frames_keep_request_id() {
        let (request_id, err) = decode(r#"{"type":"teleport","request_id":"r-9"}"#).unwrap_err();
        assert_eq!(request_id.as_deref(), Some("r-9"));
        assert!(err.to_string().starts_with("protocol error: invalid frame"));

        let (request_id, _) = decode("not json").unwrap_err();
        assert!(request_id.is_none());
    }

    #[test]
    fn encode_echoes_request_id() {
        let frame: Value = serde_json::from_str(&ServerFrame::Pong.encode(Some("r-2"))).unwrap();
        assert_eq!(frame, json!({"type": "pong", "request_id": "r-2"}));

        let frame: Value =
            serde_json::from_str(&ServerFrame::error("bad").encode(None)).unwrap();
        assert_eq!(frame, json!({"type": "error", "content": "bad"}));
    }

    #[test]
    fn progress_events_map_to_frames() {
        let frame = ServerFrame::from_event(AgentEvent::ToolResult {
            call_id: "c1".into(),
            name: "bash".into(),
            result: "ok".into(),
        });
        assert_eq!(
            frame,
            Some(ServerFrame::ToolResult {
                name: "bash".into(),
                result: "ok".into(),
                call_id: "c1".into(),
            })
        );
        assert!(
            ServerFrame::from_event(AgentEvent::Start {
                session_id: "main".into()
            })
            .is_none()
        );
    }
}
