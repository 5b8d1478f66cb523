use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Utc};
use tracing::{debug, instrument};

use super::models::ParticipantStanding;
use super::types::{
    ChangedQuery, ChangedResponse, SeriesQuery, SeriesResponse, StandingEntry, StandingsQuery,
    StandingsResponse, VersionResponse,
};
use crate::scoring::models::Window;
use crate::shared::{AppError, AppState};

fn entry(standing: &ParticipantStanding, score_change_24h: Option<i64>) -> StandingEntry {
    StandingEntry {
        participant_id: standing.participant_id.clone(),
        display_rank: standing.rank,
        total_score: standing.total_score,
        solves: standing.solves,
        score_change_24h,
    }
}

/// HTTP handler for the ranked standings
///
/// GET /standings?category=<id|all>&as_of=<rfc3339>
/// The global current view carries the trailing-24h score change and the
/// board-wide solve count; category and point-in-time views omit them.
/// Unknown categories yield an empty board, not an error.
#[instrument(name = "get_standings", skip(state))]
pub async fn get_standings(
    State(state): State<AppState>,
    Query(query): Query<StandingsQuery>,
) -> Result<Json<StandingsResponse>, AppError> {
    let category = query.category.filter(|c| c != "all");

    if let Some(at) = query.as_of {
        if category.is_some() {
            return Err(AppError::BadRequest(
                "as_of cannot be combined with a category filter".to_string(),
            ));
        }

        let snapshot = state.scoring_service.snapshot_as_of(at).await?;
        debug!(version = snapshot.version, "Reconstructed point-in-time board");
        return Ok(Json(StandingsResponse {
            version: snapshot.version,
            generated_at: snapshot.generated_at,
            total_solves: None,
            standings: snapshot.standings.iter().map(|s| entry(s, None)).collect(),
        }));
    }

    if let Some(category_id) = category {
        let standings = state.scoring_service.category_standings(&category_id).await;
        return Ok(Json(StandingsResponse {
            version: state.scoring_service.version(),
            generated_at: Utc::now(),
            total_solves: None,
            standings: standings.iter().map(|s| entry(s, None)).collect(),
        }));
    }

    let snapshot = state.scoring_service.current_snapshot().await;
    let changes = state
        .scoring_service
        .changes_since(Utc::now() - Duration::hours(24))
        .await;
    let total_solves = state.scoring_service.total_solves().await;

    Ok(Json(StandingsResponse {
        version: snapshot.version,
        generated_at: snapshot.generated_at,
        total_solves: Some(total_solves),
        standings: snapshot
            .standings
            .iter()
            .map(|s| {
                let change = changes.get(&s.participant_id).copied().unwrap_or(0);
                entry(s, Some(change))
            })
            .collect(),
    }))
}

/// HTTP handler for cumulative score histories
///
/// GET /series?participants=<id,id,...>&window=<hour|day|all>
/// Participants with no recorded events are absent from the response map.
#[instrument(name = "get_series", skip(state))]
pub async fn get_series(
    State(state): State<AppState>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<SeriesResponse>, AppError> {
    let window = match &query.window {
        None => Window::All,
        Some(raw) => raw
            .parse::<Window>()
            .map_err(|_| AppError::BadRequest(format!("unknown window '{raw}'")))?,
    };

    let participant_ids: Vec<String> = query
        .participants
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();

    let series = state.scoring_service.series(&participant_ids, window).await;
    debug!(
        requested = participant_ids.len(),
        returned = series.len(),
        "Series query answered"
    );

    Ok(Json(SeriesResponse {
        window: window.to_string(),
        series,
    }))
}

/// HTTP handler for the current snapshot version
///
/// GET /version
pub async fn get_version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.scoring_service.version(),
    })
}

/// HTTP handler for the cheap poll contract
///
/// GET /changed?since=<version>
/// Lets clients detect "nothing new" without transferring the board.
pub async fn poll_changed(
    State(state): State<AppState>,
    Query(query): Query<ChangedQuery>,
) -> Json<ChangedResponse> {
    Json(ChangedResponse {
        changed: state.scoring_service.changed_since(query.since),
        version: state.scoring_service.version(),
    })
}
