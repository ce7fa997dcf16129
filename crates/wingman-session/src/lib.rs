// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session kernel for the Wingman agent runtime.
//!
//! Maps conversation coordinates (channel, user, group) onto deterministic
//! session ids, attaches a security policy per session kind, keeps the
//! append-only message log, and persists sessions between turns.

pub mod key;
pub mod manager;
pub mod policy;
pub mod session;
pub mod store;

pub use key::{sanitize_id, storage_stem, SessionKey, SessionKind};
pub use manager::{SessionHandle, SessionManager};
pub use policy::{SandboxLevel, SessionPolicy};
pub use session::{Session, SessionMessage};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, SessionSummary};
