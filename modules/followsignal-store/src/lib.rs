//! Snapshot persistence for tracked accounts and watcher state.
//!
//! Two backends: Postgres for deployments, in-memory for tests and
//! single-shot runs without a database. Both store the same things,
//! the last known following set per tracked account plus small
//! key/value state blobs such as the rotation cursor.

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use followsignal_common::{RotationCursor, TrackedAccount};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Persistence seam for follow snapshots and scheduler state.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot for one tracked account, if it has ever been synced.
    async fn get(&self, handle: &str) -> Result<Option<TrackedAccount>>;

    /// Insert or replace the snapshot for one tracked account.
    async fn put(&self, account: &TrackedAccount) -> Result<()>;

    /// Remove snapshots for accounts no longer on the watch list.
    async fn delete(&self, handles: &[String]) -> Result<()>;

    /// All handles with a stored snapshot.
    async fn list_handles(&self) -> Result<Vec<String>>;

    /// Read an opaque state value by key.
    async fn get_state(&self, key: &str) -> Result<Option<String>>;

    /// Write an opaque state value by key.
    async fn set_state(&self, key: &str, value: &str) -> Result<()>;

    /// Load the rotation cursor, falling back to an empty cursor when the
    /// stored value is missing or no longer parses.
    async fn load_cursor(&self) -> Result<RotationCursor> {
        match self.get_state(RotationCursor::STATE_KEY).await? {
            Some(raw) => match RotationCursor::decode(&raw) {
                Ok(cursor) => Ok(cursor),
                Err(e) => {
                    warn!(error = %e, "Stored rotation cursor is unreadable, starting a fresh rotation");
                    Ok(RotationCursor::default())
                }
            },
            None => Ok(RotationCursor::default()),
        }
    }

    /// Persist the rotation cursor.
    async fn save_cursor(&self, cursor: &RotationCursor) -> Result<()> {
        self.set_state(RotationCursor::STATE_KEY, &cursor.encode())
            .await
    }
}
