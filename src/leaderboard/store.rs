use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::models::{ParticipantStanding, Snapshot};

/// Owner of the published board state.
///
/// Holds the latest snapshot behind a read-write lock and a monotonically
/// increasing version counter. Publication swaps the whole snapshot under
/// the write lock, so a reader either sees the previous board or the next
/// one, never a torn update. Version reads are lock-free for the polling
/// path.
pub struct LeaderboardStore {
    current: RwLock<Arc<Snapshot>>,
    version: AtomicU64,
}

impl Default for LeaderboardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaderboardStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            version: AtomicU64::new(0),
        }
    }

    /// Publishes a new board, superseding the current snapshot atomically.
    /// Returns the new version.
    pub async fn publish(&self, standings: Vec<ParticipantStanding>) -> u64 {
        let mut current = self.current.write().await;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        *current = Arc::new(Snapshot {
            version,
            generated_at: chrono::Utc::now(),
            standings,
        });

        debug!(version, "Snapshot published");
        version
    }

    /// The latest published snapshot.
    pub async fn current(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Current snapshot version without touching the snapshot itself.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Poll contract: has anything been published after `since`?
    pub fn changed_since(&self, since: u64) -> bool {
        self.version() > since
    }
}
