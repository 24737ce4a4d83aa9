//! coldstart-api: the HTTP control surface.
//!
//! Two routes, both JSON:
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/start` | Request the server to be started or created |
//! | GET | `/status` | Current lifecycle snapshot |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;
use axum::routing::{get, post};
use coldstart_manager::Manager;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<Manager>,
}

/// Build the API router.
///
/// Fails when `allowed_origin` is not a valid header value; a bad
/// origin must abort startup rather than degrade to allowing any.
pub fn build_router(
    manager: Arc<Manager>,
    allowed_origin: &str,
) -> Result<Router, InvalidHeaderValue> {
    let state = ApiState { manager };

    let router = Router::new()
        .route("/start", post(handlers::start_server))
        .route("/status", get(handlers::server_status))
        .layer(cors_layer(allowed_origin)?)
        .with_state(state);
    Ok(router)
}

/// Browser clients live on a separate site, so the configured origin
/// is allowed explicitly. `*` opens the API up entirely.
fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return Ok(cors.allow_origin(Any));
    }
    let value: HeaderValue = origin.parse()?;
    Ok(cors.allow_origin(value))
}
