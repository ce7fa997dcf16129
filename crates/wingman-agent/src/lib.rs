// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent runtime for Wingman.
//!
//! [`AgentRuntime`] drives a conversation turn: it locks the session,
//! assembles the system prompt from workspace memory, calls the provider
//! chain and executes permitted tool calls until the model answers.
//! [`HeartbeatScheduler`] runs periodic maintenance alongside it, and the
//! [`delegation`] tools let a session hand work to sub-agent sessions.

pub mod context;
pub mod delegation;
pub mod events;
pub mod heartbeat;
pub mod runtime;
pub mod shutdown;

pub use context::PromptBuilder;
pub use delegation::{register_delegation_tools, ChildSession, Delegation};
pub use events::{AgentEvent, EventSink, TurnOutcome};
pub use heartbeat::{register_default_tasks, HeartbeatScheduler, HeartbeatTaskStatus};
pub use runtime::{AgentRuntime, RuntimeSettings, TurnReply, TurnRequest};
pub use shutdown::install_signal_handler;
