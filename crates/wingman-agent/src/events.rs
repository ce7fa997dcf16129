// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn progress events and turn outcomes.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Longest tool result carried by a [`AgentEvent::ToolResult`].
pub const EVENT_RESULT_PREVIEW_CHARS: usize = 500;

/// Progress notifications emitted while a turn runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    Start {
        session_id: String,
    },
    Thinking {
        status: String,
    },
    ToolCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        call_id: String,
        name: String,
        result: String,
    },
    Complete {
        session_id: String,
        text: String,
    },
}

/// Receiving end is optional: a closed sink only stops delivery.
pub type EventSink = mpsc::Sender<AgentEvent>;

/// How a turn ended. Every variant renders to user-visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced a final answer.
    Answer(String),
    /// The tool loop hit the session's iteration ceiling; partial output
    /// is discarded.
    IterationLimitReached { iterations: u32 },
    /// The model could not be reached. Holds the rendered error text.
    Failed(String),
    /// The request id was already processed.
    Duplicate,
}

impl TurnOutcome {
    pub fn text(&self) -> String {
        self.to_string()
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, TurnOutcome::Answer(_))
    }
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnOutcome::Answer(text) | TurnOutcome::Failed(text) => f.write_str(text),
            TurnOutcome::IterationLimitReached { iterations } => write!(
                f,
                "⚠️ Reached maximum tool iterations ({iterations}). The task may be incomplete."
            ),
            TurnOutcome::Duplicate => f.write_str("(duplicate request ignored)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_texts() {
        assert_eq!(TurnOutcome::Answer("4".into()).text(), "4");
        assert_eq!(
            TurnOutcome::IterationLimitReached { iterations: 3 }.text(),
            "⚠️ Reached maximum tool iterations (3). The task may be incomplete."
        );
        assert_eq!(TurnOutcome::Duplicate.text(), "(duplicate request ignored)");
        assert!(!TurnOutcome::Failed("❌ x".into()).is_answer());
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = AgentEvent::Thinking {
            status: "step 1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "thinking");
        assert_eq!(json["status"], "step 1");
    }
}
