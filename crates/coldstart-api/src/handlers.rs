//! HTTP handlers.
//!
//! Thin wrappers over the orchestrator; every decision happens in
//! `coldstart-manager`, so both handlers are infallible.

use axum::Json;
use axum::extract::State;
use coldstart_manager::{StartOutcome, StatusSnapshot};

use crate::ApiState;

/// POST /start response body.
#[derive(Debug, serde::Serialize)]
pub struct StartResponse {
    pub status: StartOutcome,
}

/// POST /start
pub async fn start_server(State(state): State<ApiState>) -> Json<StartResponse> {
    let status = state.manager.request_start().await;
    Json(StartResponse { status })
}

/// GET /status
pub async fn server_status(State(state): State<ApiState>) -> Json<StatusSnapshot> {
    Json(state.manager.status_snapshot().await)
}
