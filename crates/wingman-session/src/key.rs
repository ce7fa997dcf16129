// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session kinds and deterministic session identifiers.
//!
//! A session id is a pure function of the conversation's coordinates, so
//! resolving the same coordinates twice always lands on the same session.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// Channel name whose conversations collapse onto the single `main` session.
pub const CLI_CHANNEL: &str = "cli";

/// The kind of conversation a session represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionKind {
    /// The owner's local terminal.
    Main,
    /// One-to-one chat with a user on some channel.
    #[serde(rename = "dm")]
    #[strum(serialize = "dm")]
    DirectMessage,
    /// Shared room with many participants.
    Group,
    /// Long-running project work.
    Project,
    /// Agent-to-agent delegation.
    Agent,
}

/// Everything needed to open a session: its id plus the coordinates it was
/// derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub id: String,
    pub kind: SessionKind,
    pub channel: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
}

impl SessionKey {
    /// Derives the key for an inbound chat message.
    ///
    /// - channel `cli` maps to `main`
    /// - a direct message from a known user maps to `dm:{channel}:{user}`
    /// - a message in a group maps to `group:{channel}:{group}`
    /// - anything else maps to `dm:{channel}:{user or "unknown"}`
    pub fn derive(
        channel: &str,
        user_id: Option<&str>,
        group_id: Option<&str>,
        is_direct: bool,
    ) -> Self {
        let (id, kind) = if channel == CLI_CHANNEL {
            ("main".to_string(), SessionKind::Main)
        } else if let (true, Some(user)) = (is_direct, user_id) {
            (format!("dm:{channel}:{user}"), SessionKind::DirectMessage)
        } else if let Some(group) = group_id {
            (format!("group:{channel}:{group}"), SessionKind::Group)
        } else {
            (
                format!("dm:{channel}:{}", user_id.unwrap_or("unknown")),
                SessionKind::DirectMessage,
            )
        };

        Self {
            id,
            kind,
            channel: channel.to_string(),
            user_id: user_id.map(str::to_string),
            group_id: group_id.map(str::to_string),
        }
    }

    /// Key for a named project: `project:{hex8}`.
    pub fn project(name: &str) -> Self {
        Self {
            id: format!("project:{}", short_hash(name)),
            kind: SessionKind::Project,
            channel: "project".to_string(),
            user_id: None,
            group_id: None,
        }
    }

    /// Key for a delegated sub-agent conversation: `agent:{hex8}`.
    pub fn agent(parent_session: &str, purpose: &str) -> Self {
        Self {
            id: format!("agent:{}", short_hash(&format!("{parent_session}\n{purpose}"))),
            kind: SessionKind::Agent,
            channel: "agent".to_string(),
            user_id: None,
            group_id: None,
        }
    }
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

/// Maps a session id onto a filesystem-safe stem.
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File stem for storing `id`: the sanitized id, plus a short hash of the
/// raw id whenever sanitizing changed it. Distinct ids never share a stem.
pub fn storage_stem(id: &str) -> String {
    let safe = sanitize_id(id);
    if safe == id {
        safe
    } else {
        format!("{safe}-{}", short_hash(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_always_main() {
        let key = SessionKey::derive("cli", Some("alice"), Some("room"), false);
        assert_eq!(key.id, "main");
        assert_eq!(key.kind, SessionKind::Main);
    }

    #[test]
    fn direct_message_with_user() {
        let key = SessionKey::derive("telegram", Some("42"), None, true);
        assert_eq!(key.id, "dm:telegram:42");
        assert_eq!(key.kind, SessionKind::DirectMessage);
    }

    #[test]
    fn group_message() {
        let key = SessionKey::derive("discord", Some("42"), Some("general"), false);
        assert_eq!(key.id, "group:discord:general");
        assert_eq!(key.kind, SessionKind::Group);
    }

    #[test]
    fn direct_flag_wins_over_group() {
        let key = SessionKey::derive("discord", Some("42"), Some("general"), true);
        assert_eq!(key.id, "dm:discord:42");
    }

    #[test]
    fn fallback_without_user() {
        let key = SessionKey::derive("web", None, None, false);
        assert_eq!(key.id, "dm:web:unknown");
        assert_eq!(key.kind, SessionKind::DirectMessage);

        let key = SessionKey::derive("web", Some("bob"), None, false);
        assert_eq!(key.id, "dm:web:bob");
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = SessionKey::derive("slack", Some("u1"), Some("g1"), false);
        let b = SessionKey::derive("slack", Some("u1"), Some("g1"), false);
        assert_eq!(a, b);

        assert_eq!(SessionKey::project("site").id, SessionKey::project("site").id);
        assert_ne!(SessionKey::project("site").id, SessionKey::project("blog").id);
    }

    #[test]
    fn project_and_agent_ids_have_short_hash() {
        let project = SessionKey::project("site");
        let hash = project.id.strip_prefix("project:").unwrap();
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

        let agent = SessionKey::agent("main", "research");
        assert!(agent.id.starts_with("agent:"));
        assert_eq!(agent.kind, SessionKind::Agent);
    }

    #[test]
    fn kind_string_forms() {
        use std::str::FromStr;
        assert_eq!(SessionKind::DirectMessage.to_string(), "dm");
        assert_eq!(SessionKind::from_str("group").unwrap(), SessionKind::Group);
        assert_eq!(
            serde_json::to_string(&SessionKind::DirectMessage).unwrap(),
            "\"dm\""
        );
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_id("dm:telegram:42"), "dm_telegram_42");
        assert_eq!(sanitize_id("group:x/../y"), "group_x_.._y");
        assert_eq!(sanitize_id("main"), "main");
    }

    #[test]
    fn storage_stems_keep_lossy_ids_apart() {
        assert_eq!(storage_stem("main"), "main");
        let colon = storage_stem("dm:x:a:b");
        let underscore = storage_stem("dm:x:a_b");
        assert!(colon.starts_with("dm_x_a_b-"), "{colon}");
        assert_ne!(colon, underscore);
        assert_ne!(storage_stem("dm_x_a_b"), colon);
    }
}
