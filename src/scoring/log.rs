use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::errors::ScoringError;
use super::models::{EventKind, RecordedEvent, ScoreEvent};

/// Append-only log of score events.
///
/// `append` is the single write path: it validates the delta sign rules and
/// enforces at-most-one credit per (participant, causality) pair before
/// anything is stored. A rejected event leaves the log untouched.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, event: ScoreEvent) -> Result<RecordedEvent, ScoringError>;

    /// Events with sequence number greater than `seq`, ordered by
    /// (timestamp, seq). Callers keep their own cursor and may restart from
    /// any position; the log only grows.
    async fn events_since(&self, seq: u64) -> Result<Vec<RecordedEvent>, ScoringError>;
}

struct LogInner {
    /// Kept ordered by (timestamp, seq) so reads are timestamp-ordered even
    /// when producer clocks deliver events slightly out of order.
    events: Vec<RecordedEvent>,
    seen: HashSet<(String, String)>,
    next_seq: u64,
}

/// In-memory implementation of the event log for development and testing.
pub struct InMemoryEventLog {
    inner: Mutex<LogInner>,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                events: Vec::new(),
                seen: HashSet::new(),
                next_seq: 0,
            }),
        }
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    #[instrument(skip(self, event), fields(participant_id = %event.participant_id, causality_id = %event.causality_id))]
    async fn append(&self, event: ScoreEvent) -> Result<RecordedEvent, ScoringError> {
        event.validate()?;

        let mut inner = self.inner.lock().unwrap();

        let dedup_key = (event.participant_id.clone(), event.causality_id.clone());
        if inner.seen.contains(&dedup_key) {
            warn!(
                participant_id = %event.participant_id,
                causality_id = %event.causality_id,
                "Rejecting duplicate event"
            );
            return Err(ScoringError::DuplicateEvent {
                participant_id: event.participant_id,
                causality_id: event.causality_id,
            });
        }

        inner.next_seq += 1;
        let recorded = RecordedEvent {
            id: Uuid::new_v4().to_string(),
            seq: inner.next_seq,
            event,
        };

        let position = inner
            .events
            .partition_point(|r| (r.event.timestamp, r.seq) <= (recorded.event.timestamp, recorded.seq));
        inner.events.insert(position, recorded.clone());
        inner.seen.insert(dedup_key);

        debug!(seq = recorded.seq, event_id = %recorded.id, "Event appended to log");
        Ok(recorded)
    }

    #[instrument(skip(self))]
    async fn events_since(&self, seq: u64) -> Result<Vec<RecordedEvent>, ScoringError> {
        let inner = self.inner.lock().unwrap();
        let events = inner
            .events
            .iter()
            .filter(|r| r.seq > seq)
            .cloned()
            .collect();
        Ok(events)
    }
}

/// PostgreSQL implementation of the event log.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE score_events (
///     seq            BIGSERIAL PRIMARY KEY,
///     id             TEXT NOT NULL,
///     participant_id TEXT NOT NULL,
///     category_id    TEXT,
///     kind           TEXT NOT NULL,
///     delta          BIGINT NOT NULL,
///     occurred_at    TIMESTAMPTZ NOT NULL,
///     causality_id   TEXT NOT NULL,
///     UNIQUE (participant_id, causality_id)
/// );
/// ```
///
/// The unique index carries the dedup guarantee, so concurrent producers
/// cannot double-credit the same causality even across processes.
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    #[instrument(skip(self, event), fields(participant_id = %event.participant_id, causality_id = %event.causality_id))]
    async fn append(&self, event: ScoreEvent) -> Result<RecordedEvent, ScoringError> {
        event.validate()?;

        let id = Uuid::new_v4().to_string();
        let row = sqlx::query(
            "INSERT INTO score_events (id, participant_id, category_id, kind, delta, occurred_at, causality_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING seq",
        )
        .bind(&id)
        .bind(&event.participant_id)
        .bind(&event.category_id)
        .bind(event.kind.to_string())
        .bind(event.delta)
        .bind(event.timestamp)
        .bind(&event.causality_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false);
            if duplicate {
                warn!(
                    participant_id = %event.participant_id,
                    causality_id = %event.causality_id,
                    "Rejecting duplicate event"
                );
                ScoringError::DuplicateEvent {
                    participant_id: event.participant_id.clone(),
                    causality_id: event.causality_id.clone(),
                }
            } else {
                warn!(error = %e, "Failed to append event to database");
                ScoringError::Log(e.to_string())
            }
        })?;

        let seq = row.get::<i64, _>("seq") as u64;
        debug!(seq, event_id = %id, "Event appended to database log");

        Ok(RecordedEvent { id, seq, event })
    }

    #[instrument(skip(self))]
    async fn events_since(&self, seq: u64) -> Result<Vec<RecordedEvent>, ScoringError> {
        let rows = sqlx::query(
            "SELECT seq, id, participant_id, category_id, kind, delta, occurred_at, causality_id \
             FROM score_events WHERE seq > $1 ORDER BY occurred_at, seq",
        )
        .bind(seq as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to read events from database");
            ScoringError::Log(e.to_string())
        })?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_text: String = row.get("kind");
            let kind = EventKind::from_str(&kind_text)
                .map_err(|_| ScoringError::Log(format!("unknown event kind '{kind_text}'")))?;

            events.push(RecordedEvent {
                id: row.get("id"),
                seq: row.get::<i64, _>("seq") as u64,
                event: ScoreEvent {
                    participant_id: row.get("participant_id"),
                    category_id: row.get("category_id"),
                    delta: row.get("delta"),
                    timestamp: row.get("occurred_at"),
                    kind,
                    causality_id: row.get("causality_id"),
                },
            });
        }

        Ok(events)
    }
}
