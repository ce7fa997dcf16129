// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session persistence backends.
//!
//! The file store writes one pretty-printed JSON document per session at
//! `{dir}/{stem}.json`, where the stem is the sanitized id with a short hash
//! of the raw id appended whenever sanitizing was lossy. Writes land in a sibling temp file first and
//! are renamed into place, so a crash mid-write never truncates a session.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wingman_core::{AdapterType, HealthStatus, PluginAdapter, WingmanError};

use crate::key::{storage_stem, SessionKind};
use crate::session::Session;

/// Listing entry for a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub kind: SessionKind,
    pub channel: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            kind: s.kind,
            channel: s.channel.clone(),
            message_count: s.messages.len(),
            updated_at: s.updated_at,
        }
    }
}

/// Durable storage for sessions.
#[async_trait]
pub trait SessionStore: PluginAdapter {
    /// Loads a session; `Ok(None)` when nothing is stored under `id`.
    async fn load(&self, id: &str) -> Result<Option<Session>, WingmanError>;

    /// Writes the full session document, replacing any previous version.
    async fn save(&self, session: &Session) -> Result<(), WingmanError>;

    /// Removes a stored session. Returns whether anything was removed.
    async fn delete(&self, id: &str) -> Result<bool, WingmanError>;

    async fn list(&self) -> Result<Vec<SessionSummary>, WingmanError>;
}

/// JSON-file session store.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", storage_stem(id)))
    }
}

#[async_trait]
impl PluginAdapter for FileSessionStore {
    fn name(&self) -> &str {
        "file-sessions"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, WingmanError> {
        match tokio::fs::create_dir_all(&self.dir).await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "session directory {} unavailable: {e}",
                self.dir.display()
            ))),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>, WingmanError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WingmanError::storage(e)),
        };

        let session: Session = serde_json::from_slice(&bytes).map_err(WingmanError::storage)?;

        // Guards against hand-edited or foreign documents.
        if session.id != id {
            warn!(
                requested = %id,
                stored = %session.id,
                path = %path.display(),
                "session file belongs to a different id, ignoring"
            );
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<(), WingmanError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(WingmanError::storage)?;

        let path = self.path_for(&session.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(session).map_err(WingmanError::storage)?;

        tokio::fs::write(&tmp, json)
            .await
            .map_err(WingmanError::storage)?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(WingmanError::storage)?;

        debug!(session_id = %session.id, path = %path.display(), "session saved");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, WingmanError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(WingmanError::storage(e)),
        }
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, WingmanError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WingmanError::storage(e)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(WingmanError::storage)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable session file skipped");
                    continue;
                }
            };
            match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => summaries.push(SessionSummary::from(&session)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt session file skipped");
                }
            }
        }

        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }
}

/// In-process store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for MemorySessionStore {
    fn name(&self) -> &str {
        "memory-sessions"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, WingmanError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>, WingmanError> {
        Ok(self.sessions.get(id).map(|s| s.clone()))
    }

    async fn save(&self, session: &Session) -> Result<(), WingmanError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, WingmanError> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, WingmanError> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| SessionSummary::from(entry.value()))
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }
}
