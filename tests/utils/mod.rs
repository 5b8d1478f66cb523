use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use tower::ServiceExt; // for `oneshot`

use flagboard::scoring::{AggregatorConfig, InMemoryEventLog, ScoringService};
use flagboard::shared::{build_router, AppState};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestApp {
    router: Router,
}

pub struct TestAppBuilder {
    config: AggregatorConfig,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            config: AggregatorConfig::default(),
        }
    }

    #[allow(dead_code)]
    pub fn with_bucket_secs(mut self, secs: u64) -> Self {
        self.config.bucket_width = std::time::Duration::from_secs(secs);
        self
    }

    pub fn build(self) -> TestApp {
        let scoring_service = ScoringService::builder(Arc::new(InMemoryEventLog::new()))
            .with_config(self.config)
            .build();
        let state = AppState::new(Arc::new(scoring_service));
        TestApp {
            router: build_router(state),
        }
    }
}

impl TestApp {
    /// Posts a score event through the real ingestion endpoint.
    pub async fn submit_event(
        &self,
        participant: &str,
        category: Option<&str>,
        delta: i64,
        timestamp: DateTime<Utc>,
        kind: &str,
        causality: &str,
    ) -> Response {
        let mut payload = json!({
            "participant_id": participant,
            "delta": delta,
            "timestamp": timestamp.to_rfc3339(),
            "kind": kind,
            "causality_id": causality,
        });
        if let Some(category) = category {
            payload["category_id"] = json!(category);
        }

        let request = Request::builder()
            .method("POST")
            .uri("/events")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_json<T: DeserializeOwned>(response: Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Encodes an RFC 3339 timestamp for use inside a query string.
pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339().replace('+', "%2B").replace(':', "%3A")
}
