//! Axum handlers for the worker's small REST surface.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::{state::AppState, token};

#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
pub struct MintTokenPayload {
    pub room: String,
    pub identity: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Mints a one-hour room access token for a participant.
pub async fn mint_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MintTokenPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let (key, secret) = match (
        state.config.room_api_key.as_deref(),
        state.config.room_api_secret.as_deref(),
    ) {
        (Some(key), Some(secret)) => (key, secret),
        _ => {
            return Err(ApiError::BadRequest(
                "room token keys are not configured on this worker".to_string(),
            ));
        }
    };
    let token = token::mint(key, secret, &payload.room, &payload.identity, Duration::hours(1))?;
    Ok(Json(TokenResponse { token }))
}
