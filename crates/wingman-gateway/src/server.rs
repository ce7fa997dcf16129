// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use wingman_agent::AgentRuntime;
use wingman_core::WingmanError;

use crate::handlers;
use crate::project::ProjectManager;
use crate::rooms::RoomRegistry;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub runtime: Arc<AgentRuntime>,
    pub projects: Arc<ProjectManager>,
    pub rooms: Arc<RoomRegistry>,
    /// Model label reported in `session` frames and health.
    pub model: String,
    /// Largest accepted WebSocket message.
    pub max_frame_bytes: usize,
    pub started: Instant,
}

impl GatewayState {
    pub fn new(
        runtime: Arc<AgentRuntime>,
        workspace: &Path,
        model: impl Into<String>,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            projects: Arc::new(ProjectManager::new(workspace, runtime.clone())),
            runtime,
            rooms: Arc::new(RoomRegistry::new()),
            model: model.into(),
            max_frame_bytes,
            started: Instant::now(),
        }
    }
}

/// Gateway server configuration (mirrors `[gateway]`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Routes:
/// - GET /ws
/// - GET /api/health
/// - GET /api/sessions
/// - GET /api/tools
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(handlers::get_health))
        .route("/api/sessions", get(handlers::get_sessions))
        .route("/api/tools", get(handlers::get_tools))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `host:port` and serves until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), WingmanError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WingmanError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| WingmanError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}
