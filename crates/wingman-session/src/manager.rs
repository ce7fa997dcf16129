// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session resolution, caching and persistence.
//!
//! Every live session sits behind its own `tokio::sync::Mutex`. A turn holds
//! that lock from the user message to the final reply, so two turns for the
//! same session never interleave while turns for different sessions run
//! concurrently.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wingman_config::model::PolicyOverride;
use wingman_core::WingmanError;

use crate::key::{SessionKey, SessionKind};
use crate::policy::SessionPolicy;
use crate::session::Session;
use crate::store::{SessionStore, SessionSummary};

/// Shared, lockable handle to a live session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Owns the set of live sessions and their backing store.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    live: DashMap<String, SessionHandle>,
    overrides: BTreeMap<String, PolicyOverride>,
    /// Serializes the load-or-create path so concurrent resolves of a new id
    /// end up sharing one handle.
    open_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_overrides(store, BTreeMap::new())
    }

    /// Creates a manager whose new sessions get `overrides[kind]` applied on
    /// top of the built-in policy for their kind.
    pub fn with_overrides(
        store: Arc<dyn SessionStore>,
        overrides: BTreeMap<String, PolicyOverride>,
    ) -> Self {
        Self {
            store,
            live: DashMap::new(),
            overrides,
            open_lock: Mutex::new(()),
        }
    }

    /// The policy a newly created session of `kind` receives.
    pub fn policy_for(&self, kind: SessionKind) -> SessionPolicy {
        let base = SessionPolicy::for_kind(kind);
        match self.overrides.get(&kind.to_string()) {
            Some(over) => base.with_override(over),
            None => base,
        }
    }

    /// Resolves the session for an inbound message.
    pub async fn resolve(
        &self,
        channel: &str,
        user_id: Option<&str>,
        group_id: Option<&str>,
        is_direct: bool,
    ) -> SessionHandle {
        self.open(SessionKey::derive(channel, user_id, group_id, is_direct))
            .await
    }

    /// Returns the live session for `key`, loading or creating it as needed.
    ///
    /// A stored document that cannot be read is logged and replaced by a
    /// fresh session rather than failing the caller.
    pub async fn open(&self, key: SessionKey) -> SessionHandle {
        if let Some(handle) = self.live.get(&key.id) {
            return handle.clone();
        }

        let _guard = self.open_lock.lock().await;
        if let Some(handle) = self.live.get(&key.id) {
            return handle.clone();
        }

        let session = match self.store.load(&key.id).await {
            Ok(Some(session)) => {
                debug!(session_id = %key.id, messages = session.message_count(), "session loaded");
                session
            }
            Ok(None) => {
                info!(session_id = %key.id, kind = %key.kind, "session created");
                let policy = self.policy_for(key.kind);
                Session::new(key.clone(), policy)
            }
            Err(e) => {
                warn!(session_id = %key.id, error = %e, "failed to load session, starting fresh");
                let policy = self.policy_for(key.kind);
                Session::new(key.clone(), policy)
            }
        };

        let handle = Arc::new(Mutex::new(session));
        self.live.insert(key.id, handle.clone());
        handle
    }

    /// Looks up a session by id in memory, then in the store.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        if let Some(handle) = self.live.get(id) {
            return Some(handle.clone());
        }

        let _guard = self.open_lock.lock().await;
        if let Some(handle) = self.live.get(id) {
            return Some(handle.clone());
        }

        match self.store.load(id).await {
            Ok(Some(session)) => {
                let handle = Arc::new(Mutex::new(session));
                self.live.insert(id.to_string(), handle.clone());
                Some(handle)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(session_id = %id, error = %e, "failed to load session");
                None
            }
        }
    }

    /// Persists a session. Failures are logged, never returned: the
    /// in-memory copy stays authoritative and the next save retries.
    pub async fn save(&self, session: &Session) {
        if let Err(e) = self.store.save(session).await {
            warn!(session_id = %session.id, error = %e, "failed to persist session (non-fatal)");
        }
    }

    /// Persists every live session.
    pub async fn save_all(&self) {
        for handle in self.handles() {
            let session = handle.lock().await;
            self.save(&session).await;
        }
    }

    /// Summaries of stored and live sessions, live state taking precedence.
    pub async fn list(&self) -> Result<Vec<SessionSummary>, WingmanError> {
        let mut by_id: HashMap<String, SessionSummary> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        for handle in self.handles() {
            let session = handle.lock().await;
            by_id.insert(session.id.clone(), SessionSummary::from(&*session));
        }

        let mut summaries: Vec<SessionSummary> = by_id.into_values().collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    /// Drops a session from memory and storage.
    pub async fn delete(&self, id: &str) -> Result<bool, WingmanError> {
        let was_live = self.live.remove(id).is_some();
        let was_stored = self.store.delete(id).await?;
        Ok(was_live || was_stored)
    }

    /// Saves a live session and drops it from memory, keeping the stored
    /// copy. Waits for a running turn on it to finish. Returns false when
    /// the session was not live.
    pub async fn close(&self, id: &str) -> bool {
        let Some((_, handle)) = self.live.remove(id) else {
            return false;
        };
        let session = handle.lock().await;
        self.save(&session).await;
        debug!(session_id = %id, "session closed");
        true
    }

    /// Flushes and evicts live sessions idle for longer than `max_idle`.
    ///
    /// Sessions currently locked by a turn, or whose handle is still held
    /// outside the manager, are skipped. Evicting a held session would let a
    /// later resolve load a second copy that diverges from the held one.
    /// Returns the number of evicted sessions.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let cutoff = match chrono::Duration::from_std(max_idle) {
            Ok(d) => Utc::now() - d,
            Err(_) => return 0,
        };

        let mut evicted = 0;
        for (id, handle) in self.entries() {
            if is_pinned(&handle) {
                continue;
            }
            let Ok(session) = handle.try_lock() else {
                continue;
            };
            if session.updated_at >= cutoff {
                continue;
            }
            self.save(&session).await;
            drop(session);
            // Re-checked under the shard lock: a resolve during the save may
            // have handed the handle out again.
            let removed = self.live.remove_if(&id, |_, current| {
                Arc::ptr_eq(current, &handle) && !is_pinned(current)
            });
            if removed.is_some() {
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, "evicted idle sessions");
        }
        evicted
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    fn handles(&self) -> Vec<SessionHandle> {
        self.live.iter().map(|e| e.value().clone()).collect()
    }

    fn entries(&self) -> Vec<(String, SessionHandle)> {
        self.live
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

/// True when someone besides the live map and the evicting caller holds
/// `handle`.
fn is_pinned(handle: &SessionHandle) -> bool {
    Arc::strong_count(handle) > 2
}
