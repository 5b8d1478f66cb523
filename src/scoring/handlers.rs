use axum::{extract::State, Json};
use chrono::Utc;
use tracing::{info, instrument};

use super::models::ScoreEvent;
use super::types::{SubmitEventRequest, SubmitEventResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for recording a score event
///
/// POST /events
/// Returns the recorded event id and the snapshot version reflecting it.
/// Duplicate causalities answer 409, malformed deltas 422; neither touches
/// the board.
#[instrument(name = "submit_event", skip(state, request))]
pub async fn submit_event(
    State(state): State<AppState>,
    Json(request): Json<SubmitEventRequest>,
) -> Result<Json<SubmitEventResponse>, AppError> {
    let event = ScoreEvent {
        participant_id: request.participant_id,
        category_id: request.category_id,
        delta: request.delta,
        timestamp: request.timestamp.unwrap_or_else(Utc::now),
        kind: request.kind,
        causality_id: request.causality_id,
    };

    let receipt = state.scoring_service.ingest(event).await?;

    info!(
        event_id = %receipt.event_id,
        version = receipt.version,
        "Score event recorded"
    );

    Ok(Json(SubmitEventResponse {
        event_id: receipt.event_id,
        version: receipt.version,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::AppStateBuilder;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use tower::ServiceExt; // for `oneshot`

    fn app() -> Router {
        Router::new()
            .route("/events", axum::routing::post(submit_event))
            .with_state(AppStateBuilder::new().build())
    }

    fn post_event(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/events")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn records_event_and_returns_receipt() {
        let app = app();

        let body = r#"{
            "participant_id": "team-a",
            "delta": 100,
            "timestamp": "2026-03-01T10:00:00Z",
            "kind": "solve",
            "causality_id": "chal-1"
        }"#;
        let response = app.oneshot(post_event(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let receipt: SubmitEventResponse = serde_json::from_slice(&body).unwrap();
        assert!(!receipt.event_id.is_empty());
        assert_eq!(receipt.version, 1);
    }

    #[tokio::test]
    async fn duplicate_event_answers_conflict() {
        let app = app();

        let body = r#"{
            "participant_id": "team-a",
            "delta": 100,
            "kind": "solve",
            "causality_id": "chal-1"
        }"#;
        let first = app.clone().oneshot(post_event(body)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(post_event(body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn negative_solve_delta_is_unprocessable() {
        let app = app();

        let body = r#"{
            "participant_id": "team-a",
            "delta": -100,
            "kind": "solve",
            "causality_id": "chal-1"
        }"#;
        let response = app.oneshot(post_event(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected_by_deserialization() {
        let app = app();

        let body = r#"{
            "participant_id": "team-a",
            "delta": 100,
            "kind": "bonus",
            "causality_id": "chal-1"
        }"#;
        let response = app.oneshot(post_event(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
