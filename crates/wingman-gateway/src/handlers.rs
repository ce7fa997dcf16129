// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use wingman_session::SessionSummary;

use crate::server::GatewayState;

/// Response body for GET /api/health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub model: String,
    pub version: String,
    pub uptime_secs: u64,
    pub providers: Vec<String>,
    pub live_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET /api/health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        model: state.model.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started.elapsed().as_secs(),
        providers: state.runtime.providers().provider_names(),
        live_sessions: state.runtime.sessions().live_count(),
    })
}

/// GET /api/sessions
pub async fn get_sessions(State(state): State<GatewayState>) -> impl IntoResponse {
    match state.runtime.sessions().list().await {
        Ok(sessions) => (StatusCode::OK, Json(SessionListResponse { sessions })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to list sessions");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /api/tools
pub async fn get_tools(State(state): State<GatewayState>) -> Json<ToolListResponse> {
    let tools = state
        .runtime
        .tools()
        .list()
        .into_iter()
        .map(|(name, description)| ToolInfo {
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect();
    Json(ToolListResponse { tools })
}
