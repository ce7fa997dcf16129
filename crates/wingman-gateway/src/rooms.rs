// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection rooms for broadcasting turn progress.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// room -> connection id -> outbound frame sender.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, DashMap<String, mpsc::Sender<String>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, room: &str, conn_id: &str, tx: mpsc::Sender<String>) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn_id.to_string(), tx);
        debug!(room, conn_id, "joined room");
    }

    /// Removes the connection; an emptied room is dropped.
    pub fn leave(&self, room: &str, conn_id: &str) {
        if let Some(members) = self.rooms.get(room) {
            members.remove(conn_id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
        debug!(room, conn_id, "left room");
    }

    /// Queues `frame` for every member of `room` and returns how many
    /// accepted it. Closed members are pruned; a member whose queue is full
    /// misses this frame.
    pub fn broadcast(&self, room: &str, frame: &str) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for member in members.iter() {
            match member.value().try_send(frame.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(room, conn_id = %member.key(), "connection queue full, frame dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(member.key().clone()),
            }
        }
        for conn_id in closed {
            members.remove(&conn_id);
        }
        delivered
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
