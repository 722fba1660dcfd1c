use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use followsignal_common::TrackedAccount;

use crate::SnapshotStore;

// ---------------------------------------------------------------------------
// PostgresStore
// ---------------------------------------------------------------------------

/// [`SnapshotStore`] backed by Postgres. Following sets are stored as JSONB
/// so a snapshot row survives schema-free as the set grows.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url`. Callers run [`migrate`] before first use.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create tables if they don't exist. Idempotent.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracked_accounts (
            handle       TEXT PRIMARY KEY,
            user_id      BIGINT NOT NULL,
            display_name TEXT NOT NULL DEFAULT '',
            following    JSONB NOT NULL DEFAULT '[]'::jsonb,
            updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS watcher_state (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Snapshot store migrations complete");
    Ok(())
}

#[async_trait]
impl SnapshotStore for PostgresStore {
    async fn get(&self, handle: &str) -> Result<Option<TrackedAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT handle, user_id, display_name, following
            FROM tracked_accounts
            WHERE handle = $1
            "#,
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AccountRow::into_account))
    }

    async fn put(&self, account: &TrackedAccount) -> Result<()> {
        let following = serde_json::to_value(&account.following)?;
        sqlx::query(
            r#"
            INSERT INTO tracked_accounts (handle, user_id, display_name, following, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (handle) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                display_name = EXCLUDED.display_name,
                following = EXCLUDED.following,
                updated_at = now()
            "#,
        )
        .bind(&account.handle)
        .bind(account.user_id)
        .bind(&account.display_name)
        .bind(following)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, handles: &[String]) -> Result<()> {
        if handles.is_empty() {
            return Ok(());
        }
        sqlx::query("DELETE FROM tracked_accounts WHERE handle = ANY($1)")
            .bind(handles)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_handles(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT handle FROM tracked_accounts ORDER BY handle",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn get_state(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT value FROM watcher_state WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }

    async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watcher_state (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// sqlx row mapping
// ---------------------------------------------------------------------------

struct AccountRow {
    handle: String,
    user_id: i64,
    display_name: String,
    following: serde_json::Value,
}

impl AccountRow {
    fn into_account(self) -> TrackedAccount {
        // An unreadable following blob falls back to empty; the next sync
        // rebuilds the snapshot from the live API.
        let following: HashSet<String> =
            serde_json::from_value(self.following).unwrap_or_default();
        TrackedAccount {
            user_id: self.user_id,
            handle: self.handle,
            display_name: self.display_name,
            following,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AccountRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(AccountRow {
            handle: row.try_get("handle")?,
            user_id: row.try_get("user_id")?,
            display_name: row.try_get("display_name")?,
            following: row.try_get("following")?,
        })
    }
}
