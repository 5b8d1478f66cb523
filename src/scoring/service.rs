use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::leaderboard::models::{ParticipantStanding, Snapshot};
use crate::leaderboard::store::LeaderboardStore;

use super::{
    aggregator::{Aggregator, AggregatorConfig},
    errors::ScoringError,
    log::EventLog,
    models::{ScoreEvent, TimeSeriesPoint, Window},
};

/// Outcome of a successful ingestion: the recorded event's identity and the
/// snapshot version that now reflects it.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub event_id: String,
    pub seq: u64,
    pub version: u64,
}

/// Ties the event log, the aggregator and the leaderboard store together.
///
/// Ingestion for the same participant serializes on a per-participant lock;
/// different participants only contend on the short aggregator and publish
/// sections. An event is either fully applied (log entry, running totals,
/// published snapshot) or rejected with no state touched.
pub struct ScoringService {
    log: Arc<dyn EventLog>,
    aggregator: RwLock<Aggregator>,
    store: Arc<LeaderboardStore>,
    participant_locks: RwLock<HashMap<String, Arc<AsyncMutex<()>>>>,
    config: AggregatorConfig,
}

impl ScoringService {
    pub fn builder(log: Arc<dyn EventLog>) -> ScoringServiceBuilder {
        ScoringServiceBuilder::new(log)
    }

    /// Records one score event and publishes the updated board.
    ///
    /// Validation and deduplication happen inside the log append, so a
    /// rejected event never reaches the aggregator or the store.
    #[instrument(skip(self, event), fields(participant_id = %event.participant_id, kind = %event.kind, causality_id = %event.causality_id))]
    pub async fn ingest(&self, event: ScoreEvent) -> Result<IngestReceipt, ScoringError> {
        let participant_lock = self.participant_lock(&event.participant_id).await;
        let _guard = participant_lock.lock().await;

        let recorded = match self.log.append(event).await {
            Ok(recorded) => recorded,
            Err(err) => {
                warn!(error = %err, "Event rejected at ingestion");
                return Err(err);
            }
        };

        // Publication stays inside the aggregator's exclusive section so a
        // later version can never carry older standings.
        let version = {
            let mut aggregator = self.aggregator.write().await;
            aggregator.apply(&recorded.event);
            self.store.publish(aggregator.standings()).await
        };

        info!(
            seq = recorded.seq,
            event_id = %recorded.id,
            version,
            "Event ingested and snapshot published"
        );

        Ok(IngestReceipt {
            event_id: recorded.id,
            seq: recorded.seq,
            version,
        })
    }

    /// Replays the whole log into the aggregator and publishes the result.
    ///
    /// Startup recovery for a durable log. Publishes a single snapshot, so
    /// the version counter restarts at 1 rather than at the event count.
    /// Returns the number of events replayed.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<u64, ScoringError> {
        let events = self.log.events_since(0).await?;
        let count = events.len() as u64;
        if count == 0 {
            debug!("Nothing to hydrate, log is empty");
            return Ok(0);
        }

        let version = {
            let mut aggregator = self.aggregator.write().await;
            for recorded in &events {
                aggregator.apply(&recorded.event);
            }
            self.store.publish(aggregator.standings()).await
        };

        info!(events = count, version, "Hydrated aggregator from event log");
        Ok(count)
    }

    /// The latest published snapshot.
    pub async fn current_snapshot(&self) -> Arc<Snapshot> {
        self.store.current().await
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    pub fn changed_since(&self, since: u64) -> bool {
        self.store.changed_since(since)
    }

    /// Standings restricted to one category. Unknown categories yield an
    /// empty board, not an error.
    #[instrument(skip(self))]
    pub async fn category_standings(&self, category_id: &str) -> Vec<ParticipantStanding> {
        self.aggregator.read().await.category_standings(category_id)
    }

    /// Cumulative score series for the requested participants, clipped to
    /// the window. Unknown participants are absent from the result.
    #[instrument(skip(self, participant_ids))]
    pub async fn series(
        &self,
        participant_ids: &[String],
        window: Window,
    ) -> HashMap<String, Vec<TimeSeriesPoint>> {
        self.aggregator
            .read()
            .await
            .series_window(participant_ids, window, Utc::now())
    }

    /// Score gained since `since` for every ranked participant.
    pub async fn changes_since(&self, since: DateTime<Utc>) -> HashMap<String, i64> {
        self.aggregator.read().await.changes_since(since)
    }

    pub async fn total_solves(&self) -> u64 {
        self.aggregator.read().await.total_solves()
    }

    /// Reconstructs the board as it stood at `at` by replaying the log up
    /// to that instant. The reconstructed version is the number of events
    /// at or before `at`.
    #[instrument(skip(self))]
    pub async fn snapshot_as_of(&self, at: DateTime<Utc>) -> Result<Snapshot, ScoringError> {
        let events = self.log.events_since(0).await?;
        let upto: Vec<&ScoreEvent> = events
            .iter()
            .map(|recorded| &recorded.event)
            .filter(|event| event.timestamp <= at)
            .collect();

        let version = upto.len() as u64;
        let aggregator = Aggregator::replay(&self.config, upto);

        Ok(Snapshot {
            version,
            generated_at: at,
            standings: aggregator.standings(),
        })
    }

    async fn participant_lock(&self, participant_id: &str) -> Arc<AsyncMutex<()>> {
        {
            let guard = self.participant_locks.read().await;
            if let Some(lock) = guard.get(participant_id) {
                return lock.clone();
            }
        }

        let mut guard = self.participant_locks.write().await;
        guard
            .entry(participant_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

pub struct ScoringServiceBuilder {
    log: Arc<dyn EventLog>,
    store: Arc<LeaderboardStore>,
    config: AggregatorConfig,
}

impl ScoringServiceBuilder {
    fn new(log: Arc<dyn EventLog>) -> Self {
        Self {
            log,
            store: Arc::new(LeaderboardStore::new()),
            config: AggregatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: Arc<LeaderboardStore>) -> Self {
        self.store = store;
        self
    }

    pub fn build(self) -> ScoringService {
        ScoringService {
            log: self.log,
            aggregator: RwLock::new(Aggregator::new(&self.config)),
            store: self.store,
            participant_locks: RwLock::new(HashMap::new()),
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::log::InMemoryEventLog;
    use crate::scoring::models::EventKind;
    use chrono::TimeZone;
    use futures::future::join_all;
    use rand::Rng;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap()
    }

    fn solve(participant: &str, delta: i64, minute: u32, causality: &str) -> ScoreEvent {
        ScoreEvent {
            participant_id: participant.to_string(),
            category_id: None,
            delta,
            timestamp: at(minute),
            kind: EventKind::Solve,
            causality_id: causality.to_string(),
        }
    }

    fn service() -> ScoringService {
        ScoringService::builder(Arc::new(InMemoryEventLog::new())).build()
    }

    #[tokio::test]
    async fn ingest_publishes_one_version_per_event() {
        let service = service();

        let first = service.ingest(solve("a", 100, 1, "c1")).await.unwrap();
        assert_eq!(first.version, 1);

        let second = service.ingest(solve("b", 100, 2, "c1")).await.unwrap();
        assert_eq!(second.version, 2);

        let snapshot = service.current_snapshot().await;
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.standings.len(), 2);
        assert_eq!(snapshot.standings[0].participant_id, "a");
    }

    #[tokio::test]
    async fn duplicate_event_leaves_board_untouched() {
        let service = service();
        service.ingest(solve("a", 100, 1, "c1")).await.unwrap();
        let before = service.current_snapshot().await;

        let err = service.ingest(solve("a", 100, 4, "c1")).await.unwrap_err();
        assert!(matches!(err, ScoringError::DuplicateEvent { .. }));

        let after = service.current_snapshot().await;
        assert_eq!(after.version, before.version);
        assert_eq!(after.standings, before.standings);
    }

    #[tokio::test]
    async fn invalid_event_touches_nothing() {
        let service = service();

        let err = service.ingest(solve("a", -50, 1, "c1")).await.unwrap_err();
        assert!(matches!(err, ScoringError::InvalidDelta { .. }));

        assert_eq!(service.version(), 0);
        assert!(service.current_snapshot().await.standings.is_empty());
        // The causality id stays unclaimed.
        service.ingest(solve("a", 50, 2, "c1")).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_ingestion_across_participants_applies_every_event() {
        let service = Arc::new(service());

        let tasks = (0..20).map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let participant = format!("team-{}", i % 5);
                let causality = format!("chal-{i}");
                service
                    .ingest(solve(&participant, 10, 1 + (i as u32 % 50), &causality))
                    .await
            })
        });

        let results = join_all(tasks).await;
        assert!(results.into_iter().all(|r| r.unwrap().is_ok()));

        assert_eq!(service.version(), 20);
        let snapshot = service.current_snapshot().await;
        assert_eq!(snapshot.standings.len(), 5);
        // 20 events, 4 per participant, 10 points each.
        for standing in &snapshot.standings {
            assert_eq!(standing.total_score, 40);
        }
    }

    #[tokio::test]
    async fn hydrate_restores_board_from_existing_log() {
        let log = Arc::new(InMemoryEventLog::new());
        log.append(solve("a", 100, 1, "c1")).await.unwrap();
        log.append(solve("b", 70, 2, "c1")).await.unwrap();
        log.append(solve("a", 50, 3, "c2")).await.unwrap();

        let service = ScoringService::builder(log).build();
        let replayed = service.hydrate().await.unwrap();
        assert_eq!(replayed, 3);

        let snapshot = service.current_snapshot().await;
        assert_eq!(snapshot.standings[0].participant_id, "a");
        assert_eq!(snapshot.standings[0].total_score, 150);
        assert_eq!(snapshot.standings[1].total_score, 70);
    }

    #[tokio::test]
    async fn hydrate_on_empty_log_publishes_nothing() {
        let service = service();
        assert_eq!(service.hydrate().await.unwrap(), 0);
        assert_eq!(service.version(), 0);
    }

    #[tokio::test]
    async fn snapshot_as_of_matches_board_had_ingestion_stopped() {
        let service = service();
        service.ingest(solve("a", 100, 1, "c1")).await.unwrap();
        service.ingest(solve("b", 100, 2, "c1")).await.unwrap();
        let board_at_two = service.current_snapshot().await;

        service.ingest(solve("b", 300, 10, "c2")).await.unwrap();

        let reconstructed = service.snapshot_as_of(at(5)).await.unwrap();
        assert_eq!(reconstructed.version, 2);
        assert_eq!(reconstructed.standings, board_at_two.standings);

        // Probing before any event yields an empty board, and probing after
        // the last one yields the live board.
        assert!(service.snapshot_as_of(at(0)).await.unwrap().standings.is_empty());
        let full = service.snapshot_as_of(at(30)).await.unwrap();
        assert_eq!(full.standings, service.current_snapshot().await.standings);
    }

    #[tokio::test]
    async fn totals_equal_sum_of_recorded_deltas() {
        let service = service();
        let categories = ["web", "crypto", "pwn"];
        let mut rng = rand::rng();

        let mut expected_global: HashMap<String, i64> = HashMap::new();
        let mut expected_by_category: HashMap<(String, String), i64> = HashMap::new();

        for i in 0..200 {
            let participant = format!("team-{}", rng.random_range(0..8));
            let category = categories[rng.random_range(0..categories.len())];
            let delta = rng.random_range(0..500);
            let event = ScoreEvent {
                participant_id: participant.clone(),
                category_id: Some(category.to_string()),
                delta,
                timestamp: at(rng.random_range(0..59)),
                kind: EventKind::Solve,
                causality_id: format!("chal-{i}"),
            };

            service.ingest(event).await.unwrap();
            *expected_global.entry(participant.clone()).or_default() += delta;
            *expected_by_category
                .entry((participant, category.to_string()))
                .or_default() += delta;
        }

        let snapshot = service.current_snapshot().await;
        for standing in &snapshot.standings {
            assert_eq!(standing.total_score, expected_global[&standing.participant_id]);
        }

        for category in categories {
            for standing in service.category_standings(category).await {
                let key = (standing.participant_id.clone(), category.to_string());
                assert_eq!(standing.total_score, expected_by_category[&key]);
            }
        }
    }
}
