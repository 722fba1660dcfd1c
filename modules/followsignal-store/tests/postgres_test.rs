//! Integration tests for PostgresStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use followsignal_common::{RotationCursor, TrackedAccount};
use followsignal_store::{postgres, PostgresStore, SnapshotStore};
use sqlx::PgPool;

/// Get a migrated test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    postgres::migrate(&pool).await.ok()?;

    // Clean slate for each test
    sqlx::query("TRUNCATE tracked_accounts, watcher_state")
        .execute(&pool)
        .await
        .ok()?;

    Some(pool)
}

fn account(handle: &str, following: &[&str]) -> TrackedAccount {
    TrackedAccount {
        user_id: 1001,
        handle: handle.to_string(),
        display_name: format!("{handle} display"),
        following: following.iter().map(|s| s.to_string()).collect(),
    }
}

// =========================================================================
// Snapshot round-trips
// =========================================================================

#[tokio::test]
async fn put_then_get_round_trips_following_set() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresStore::new(pool);

    store
        .put(&account("alice", &["bob", "carol", "dave"]))
        .await
        .unwrap();

    let loaded = store.get("alice").await.unwrap().unwrap();
    assert_eq!(loaded.user_id, 1001);
    assert_eq!(loaded.display_name, "alice display");
    assert_eq!(loaded.following.len(), 3);
    assert!(loaded.following.contains("carol"));
}

#[tokio::test]
async fn get_unknown_handle_returns_none() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresStore::new(pool);

    assert!(store.get("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn put_twice_replaces_snapshot() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresStore::new(pool);

    store.put(&account("alice", &["bob"])).await.unwrap();
    store
        .put(&account("alice", &["carol", "dave"]))
        .await
        .unwrap();

    let loaded = store.get("alice").await.unwrap().unwrap();
    assert_eq!(loaded.following.len(), 2);
    assert!(!loaded.following.contains("bob"));

    // Upsert, not insert: still a single row
    assert_eq!(store.list_handles().await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_removes_only_named_handles() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresStore::new(pool);

    store.put(&account("alice", &[])).await.unwrap();
    store.put(&account("bob", &[])).await.unwrap();
    store.put(&account("carol", &[])).await.unwrap();

    store
        .delete(&["alice".to_string(), "carol".to_string()])
        .await
        .unwrap();

    assert_eq!(store.list_handles().await.unwrap(), vec!["bob"]);

    // Deleting nothing is a no-op
    store.delete(&[]).await.unwrap();
    assert_eq!(store.list_handles().await.unwrap(), vec!["bob"]);
}

#[tokio::test]
async fn list_handles_sorted() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresStore::new(pool);

    store.put(&account("zed", &[])).await.unwrap();
    store.put(&account("alice", &[])).await.unwrap();
    store.put(&account("mike", &[])).await.unwrap();

    assert_eq!(
        store.list_handles().await.unwrap(),
        vec!["alice", "mike", "zed"]
    );
}

// =========================================================================
// State blobs and the rotation cursor
// =========================================================================

#[tokio::test]
async fn state_round_trips_and_overwrites() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresStore::new(pool);

    assert!(store.get_state("last_run_at").await.unwrap().is_none());

    store.set_state("last_run_at", "2024-01-01").await.unwrap();
    store.set_state("last_run_at", "2024-02-01").await.unwrap();

    assert_eq!(
        store.get_state("last_run_at").await.unwrap().as_deref(),
        Some("2024-02-01")
    );
}

#[tokio::test]
async fn cursor_round_trips_through_state_table() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresStore::new(pool);

    assert!(store.load_cursor().await.unwrap().is_empty());

    let mut cursor = RotationCursor::default();
    cursor.mark("alice");
    cursor.mark("bob");
    store.save_cursor(&cursor).await.unwrap();

    let loaded = store.load_cursor().await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.contains("bob"));
}

#[tokio::test]
async fn corrupt_cursor_state_yields_fresh_cursor() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresStore::new(pool);

    store
        .set_state(RotationCursor::STATE_KEY, "not a json array")
        .await
        .unwrap();

    let cursor = store.load_cursor().await.unwrap();
    assert!(cursor.is_empty());
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let Some(pool) = test_pool().await else {
        return;
    };

    postgres::migrate(&pool).await.unwrap();
    postgres::migrate(&pool).await.unwrap();
}
