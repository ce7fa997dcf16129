// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket connection handling.
//!
//! Each connection gets an id, an outbound queue drained by a sender task,
//! and a room (its own id until the client names one). Turns and project
//! steps run as detached tasks: a client that disconnects stops receiving
//! output, but work already started runs to completion.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wingman_agent::AgentEvent;
use wingman_core::WingmanError;
use wingman_session::SessionHandle;

use crate::protocol::{self, ClientFrame, Inbound, ServerFrame};
use crate::server::GatewayState;

/// Channel name for sessions opened through the gateway.
pub const WEB_CHANNEL: &str = "webchat";

const OUTBOUND_QUEUE: usize = 256;
const EVENT_QUEUE: usize = 64;
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.max_message_size(state.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

struct Connection {
    id: String,
    room: String,
    session: Option<SessionHandle>,
    project: Option<String>,
    tx: mpsc::Sender<String>,
    state: GatewayState,
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let conn_id = uuid::Uuid::new_v4().to_string();

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let mut sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    state.rooms.join(&conn_id, &conn_id, tx.clone());
    let mut conn = Connection {
        room: conn_id.clone(),
        id: conn_id,
        session: None,
        project: None,
        tx,
        state,
    };
    info!(conn_id = %conn.id, "WebSocket client connected");

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!(conn_id = %conn.id, error = %e, "WebSocket receive failed");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let text_str: &str = &text;
                let inbound = match protocol::decode(text_str) {
                    Ok(inbound) => inbound,
                    Err((request_id, e)) => {
                        warn!(conn_id = %conn.id, error = %e, "malformed frame");
                        conn.send(ServerFrame::error(e.to_string()), request_id.as_deref())
                            .await;
                        continue;
                    }
                };

                let request_id = inbound.request_id.clone();
                match AssertUnwindSafe(conn.handle(inbound)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(conn_id = %conn.id, error = %e, "closing connection");
                        conn.send(ServerFrame::error(e.to_string()), request_id.as_deref())
                            .await;
                        break;
                    }
                    Err(_) => {
                        warn!(conn_id = %conn.id, "frame handler panicked, closing connection");
                        conn.send(
                            ServerFrame::error("internal error: connection closed"),
                            request_id.as_deref(),
                        )
                        .await;
                        break;
                    }
                }
            }
            Message::Binary(_) => {
                conn.send(ServerFrame::error("binary frames are not supported"), None)
                    .await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    conn.state.rooms.leave(&conn.room, &conn.id);
    info!(conn_id = %conn.id, "WebSocket client disconnected");
    drop(conn);

    // Give queued frames a moment to drain; detached turns may still hold
    // senders, so do not wait on them forever.
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }
}

impl Connection {
    async fn send(&self, frame: ServerFrame, request_id: Option<&str>) {
        if self.tx.send(frame.encode(request_id)).await.is_err() {
            debug!(conn_id = %self.id, "outbound queue closed");
        }
    }

    /// Sends `frame` to every connection in this connection's room.
    fn broadcast(&self, frame: ServerFrame, request_id: Option<&str>) {
        self.state.rooms.broadcast(&self.room, &frame.encode(request_id));
    }

    fn switch_room(&mut self, room: Option<String>) {
        let Some(room) = room.filter(|r| !r.is_empty() && *r != self.room) else {
            return;
        };
        self.state.rooms.leave(&self.room, &self.id);
        self.state.rooms.join(&room, &self.id, self.tx.clone());
        self.room = room;
    }

    /// The connection's own direct-message session.
    async fn own_session(&mut self) -> SessionHandle {
        if let Some(handle) = &self.session {
            return handle.clone();
        }
        let handle = self
            .state
            .runtime
            .sessions()
            .resolve(WEB_CHANNEL, Some(&self.id), None, true)
            .await;
        self.session = Some(handle.clone());
        handle
    }

    async fn handle(&mut self, inbound: Inbound) -> Result<(), WingmanError> {
        let request_id = inbound.request_id;
        let rid = request_id.as_deref();

        match inbound.frame {
            ClientFrame::Init { session_id, room } => {
                self.switch_room(room);
                let existing = match session_id.as_deref() {
                    Some(id) => self.state.runtime.sessions().get(id).await,
                    None => None,
                };
                if let Some(id) = session_id.as_deref().filter(|_| existing.is_none()) {
                    debug!(conn_id = %self.id, session_id = id, "unknown session, using connection session");
                }
                let handle = match existing {
                    Some(handle) => {
                        self.session = Some(handle.clone());
                        handle
                    }
                    None => self.own_session().await,
                };
                let session_id = handle.lock().await.id.clone();
                let frame = ServerFrame::Session {
                    session_id,
                    model: self.state.model.clone(),
                    room: self.room.clone(),
                };
                self.send(frame, rid).await;
            }

            ClientFrame::Message {
                content,
                user_id,
                group_id,
                room,
            } => {
                self.switch_room(room);
                let content = content.trim().to_string();
                if content.is_empty() {
                    self.send(ServerFrame::error("message content is empty"), rid)
                        .await;
                    return Ok(());
                }
                let handle = if user_id.is_some() || group_id.is_some() {
                    self.state
                        .runtime
                        .sessions()
                        .resolve(
                            WEB_CHANNEL,
                            user_id.as_deref(),
                            group_id.as_deref(),
                            group_id.is_none(),
                        )
                        .await
                } else {
                    self.own_session().await
                };
                self.spawn_turn(handle, content, request_id);
            }

            ClientFrame::Ping => self.send(ServerFrame::Pong, rid).await,

            ClientFrame::ProjectCreate { name, prompt } => {
                match self.state.projects.create(&name, &prompt).await {
                    Ok(project) => {
                        self.project = Some(name.clone());
                        let frame = ServerFrame::ProjectUpdate {
                            project,
                            message: None,
                        };
                        self.broadcast(frame, rid);
                        self.spawn_project_step(name, request_id).await;
                    }
                    Err(e) => self.send(ServerFrame::error(e.to_string()), rid).await,
                }
            }

            ClientFrame::ProjectLoad { name } => match self.state.projects.load(&name).await {
                Ok(Some(project)) => {
                    self.project = Some(name);
                    let frame = ServerFrame::ProjectUpdate {
                        project,
                        message: None,
                    };
                    self.send(frame, rid).await;
                }
                Ok(None) => self.send(ServerFrame::error("Project not found"), rid).await,
                Err(e) => self.send(ServerFrame::error(e.to_string()), rid).await,
            },

            ClientFrame::ProjectList => match self.state.projects.list().await {
                Ok(projects) => self.send(ServerFrame::ProjectList { projects }, rid).await,
                Err(e) => self.send(ServerFrame::error(e.to_string()), rid).await,
            },

            ClientFrame::ProjectNext { name } => {
                let Some(name) = name.or_else(|| self.project.clone()) else {
                    self.send(ServerFrame::error("No active project."), rid).await;
                    return Ok(());
                };
                self.project = Some(name.clone());
                self.spawn_project_step(name, request_id).await;
            }
        }
        Ok(())
    }

    /// Runs a turn in the background. Progress goes to the room, the reply
    /// to this connection.
    fn spawn_turn(&self, handle: SessionHandle, content: String, request_id: Option<String>) {
        let runtime = self.state.runtime.clone();
        let rooms = self.state.rooms.clone();
        let room = self.room.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let (events_tx, mut events_rx) = mpsc::channel::<AgentEvent>(EVENT_QUEUE);
            let relay_id = request_id.clone();
            let relay = tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    if let Some(frame) = ServerFrame::from_event(event) {
                        rooms.broadcast(&room, &frame.encode(relay_id.as_deref()));
                    }
                }
            });

            let reply = runtime
                .process_request(&handle, &content, request_id.as_deref(), Some(&events_tx))
                .await;
            drop(events_tx);
            if relay.await.is_err() {
                warn!("event relay task failed");
            }

            let frame = ServerFrame::Response {
                content: reply.outcome.text(),
                session_id: reply.session_id,
            };
            if tx.send(frame.encode(request_id.as_deref())).await.is_err() {
                debug!("connection closed before the reply was sent");
            }
        });
    }

    /// Runs the next project step in the background unless one is already
    /// running for `name`.
    ///
    /// Progress and the resulting project state go to the whole room; a busy
    /// project or a failed step is reported to the requester only.
    async fn spawn_project_step(&self, name: String, request_id: Option<String>) {
        let latch = self.state.projects.latch(&name);
        let Some(guard) = latch.try_claim() else {
            let frame = ServerFrame::error(format!("project '{name}' is busy"));
            self.send(frame, request_id.as_deref()).await;
            return;
        };

        let projects = self.state.projects.clone();
        let rooms = self.state.rooms.clone();
        let room = self.room.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let thinking = ServerFrame::Thinking {
                status: format!("Working on project '{name}'"),
            };
            rooms.broadcast(&room, &thinking.encode(request_id.as_deref()));

            let (events_tx, mut events_rx) = mpsc::channel::<AgentEvent>(EVENT_QUEUE);
            let relay_rooms = rooms.clone();
            let relay_room = room.clone();
            let relay_id = request_id.clone();
            let relay = tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    if let Some(frame) = ServerFrame::from_event(event) {
                        relay_rooms.broadcast(&relay_room, &frame.encode(relay_id.as_deref()));
                    }
                }
            });

            let result = projects.run_next_step(&name, Some(&events_tx)).await;
            drop(events_tx);
            if relay.await.is_err() {
                warn!("event relay task failed");
            }

            let rid = request_id.as_deref();
            match result {
                Ok((project, message)) => {
                    let frame = ServerFrame::ProjectUpdate {
                        project,
                        message: Some(message),
                    };
                    let delivered = rooms.broadcast(&room, &frame.encode(rid));
                    debug!(project = %name, delivered, "project update broadcast");
                }
                Err(e) => {
                    warn!(project = %name, error = %e, "project step failed");
                    let frame = ServerFrame::error(e.to_string());
                    if tx.send(frame.encode(rid)).await.is_err() {
                        debug!(project = %name, "connection closed before the step finished");
                    }
                }
            }
        });
    }
}
