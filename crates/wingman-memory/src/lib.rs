// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent workspace persistence for Wingman.
//!
//! Markdown memory files that shape the system prompt, the per-day activity
//! log, JSONL conversation transcripts, and the tools that let the model
//! edit its own memory.

pub mod daily;
pub mod tools;
pub mod transcript;
pub mod workspace;

pub use daily::{preview, DailyLog, DEFAULT_TAIL_LINES};
pub use tools::register_memory_tools;
pub use transcript::{TranscriptEvent, TranscriptEventType, TranscriptLogger};
pub use workspace::{MemoryFile, MemoryStore, WORKSPACE_DIRS};
