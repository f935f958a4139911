//! Axum Router Configuration

use crate::{handlers, room::ws_handler, state::AppState};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// Creates the main Axum router for the worker.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/token", post(handlers::mint_token))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}
