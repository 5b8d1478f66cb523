use std::sync::Arc;
use std::time::Duration;

use flagboard::scoring::{AggregatorConfig, InMemoryEventLog, ScoringService};
use flagboard::shared::{build_router, AppState};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flagboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting flagboard scoring service");

    let bucket_width = std::env::var("FLAGBOARD_BUCKET_SECS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| AggregatorConfig::default().bucket_width);

    // Create the event log with dependency injection
    // Easy to switch between implementations:
    let event_log = Arc::new(InMemoryEventLog::new());

    // For production with PostgreSQL:
    // let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    // let pool = sqlx::PgPool::connect(&database_url).await.expect("Failed to connect to database");
    // let event_log = Arc::new(flagboard::scoring::PostgresEventLog::new(pool));

    let scoring_service = Arc::new(
        ScoringService::builder(event_log)
            .with_config(AggregatorConfig { bucket_width })
            .build(),
    );

    match scoring_service.hydrate().await {
        Ok(0) => {}
        Ok(count) => info!(events = count, "Recovered board from event log"),
        Err(err) => warn!(error = %err, "Hydration failed, starting with an empty board"),
    }

    let app_state = AppState::new(scoring_service);
    let app = build_router(app_state);

    let addr = std::env::var("FLAGBOARD_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    info!("Server running on http://{addr}");
    axum::serve(listener, app).await.unwrap();
}
