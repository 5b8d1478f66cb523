use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::leaderboard;
use crate::scoring::{self, ScoringError, ScoringService};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub scoring_service: Arc<ScoringService>,
}

impl AppState {
    pub fn new(scoring_service: Arc<ScoringService>) -> Self {
        Self { scoring_service }
    }
}

/// Builds the full HTTP surface. Shared by `main` and the integration
/// tests so both exercise the same routes and layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(scoring::handlers::submit_event))
        .route("/standings", get(leaderboard::handlers::get_standings))
        .route("/series", get(leaderboard::handlers::get_series))
        .route("/version", get(leaderboard::handlers::get_version))
        .route("/changed", get(leaderboard::handlers::poll_changed))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Duplicate event: {0}")]
    DuplicateEvent(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        match &err {
            ScoringError::DuplicateEvent { .. } => AppError::DuplicateEvent(err.to_string()),
            ScoringError::InvalidDelta { .. } => AppError::InvalidEvent(err.to_string()),
            ScoringError::Log(message) => AppError::StorageError(message.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::DuplicateEvent(msg) => (StatusCode::CONFLICT, msg),
            AppError::InvalidEvent(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::StorageError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Storage error: {}", msg),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
