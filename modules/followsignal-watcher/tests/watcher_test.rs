//! End-to-end cycle tests: scripted graph, real in-memory store, recording
//! sink. Each test seeds snapshots, runs a cycle (or reconcile) and asserts
//! on the published records and the persisted state. No network.

use std::sync::Arc;

use chrono::{Duration, Utc};
use followsignal_common::{AppConfig, TrackedAccount, WatchError};
use followsignal_store::{MemoryStore, SnapshotStore};
use followsignal_watcher::sinks::ResultSink;
use followsignal_watcher::testing::*;
use followsignal_watcher::watcher::Watcher;
use twitter_client::TwitterError;

fn config(batch_size: usize, sweep_enabled: bool) -> AppConfig {
    AppConfig {
        twitter_bearer_token: "test-token".to_string(),
        airtable_api_key: "test-key".to_string(),
        airtable_base_id: "appTEST".to_string(),
        airtable_tracked_table: "Tracked Users".to_string(),
        airtable_keywords_table: "Keywords".to_string(),
        airtable_results_table: "New Followings".to_string(),
        airtable_leaderboard_table: "Leaderboard".to_string(),
        telegram_bot_token: None,
        telegram_chat_id: None,
        database_url: None,
        sync_interval_secs: 60,
        sync_batch_size: batch_size,
        score_threshold: 0,
        rate_limit_cooldown_secs: 1,
        max_rate_limit_waits: 3,
        fetch_timeout_secs: 5,
        sweep_enabled,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    graph: Arc<MockGraph>,
    sink: Arc<RecordingSink>,
    watcher: Watcher,
}

fn harness(
    graph: MockGraph,
    watchlist: MockWatchlist,
    batch_size: usize,
    sweep_enabled: bool,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let graph = Arc::new(graph);
    let sink = Arc::new(RecordingSink::new());
    let publish: Arc<dyn ResultSink> = sink.clone();
    let watcher = Watcher::new(
        store.clone(),
        graph.clone(),
        Arc::new(watchlist),
        vec![publish],
        &config(batch_size, sweep_enabled),
    );
    Harness {
        store,
        graph,
        sink,
        watcher,
    }
}

async fn seed(store: &MemoryStore, user_id: i64, handle: &str, following: &[&str]) {
    let mut account = TrackedAccount::new(user_id, handle, handle);
    account.following = following.iter().map(|h| h.to_string()).collect();
    store.put(&account).await.unwrap();
}

// ---------------------------------------------------------------------------
// Happy path: a new follow becomes a scored, published record
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_follow_becomes_a_published_record() {
    let graph = MockGraph::new()
        .on_following(7, following_pages(&[&["old_friend", "fresh_project"]]))
        .on_metrics(profile(
            "fresh_project",
            "token launch soon",
            150,
            Some(Utc::now() - Duration::weeks(1)),
        ));
    let watchlist = MockWatchlist::new()
        .with_account("watcher_one", 50)
        .with_keyword("launch", 30);
    let h = harness(graph, watchlist, 4, false);
    seed(&h.store, 7, "watcher_one", &["old_friend"]).await;

    let stats = h.watcher.run_cycle().await.unwrap();

    assert_eq!(stats.batch_size, 1);
    assert_eq!(stats.accounts_synced, 1);
    assert_eq!(stats.new_follows, 1);
    assert_eq!(stats.unfollows, 0);
    assert_eq!(stats.records_published, 1);
    assert_eq!(stats.snapshots_written, 1);

    let records = h.sink.published();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.tracked_handle, "watcher_one");
    assert_eq!(record.followed_handle, "fresh_project");
    assert_eq!(record.tracked_points, 50);
    assert_eq!(record.description_points, 30);
    assert_eq!(record.follower_count, 150);
    assert_eq!(record.follower_points, 100);
    assert_eq!(record.created_at_points, 100, "week-old account is top tier");
    assert_eq!(record.url_points, 0);
    assert_eq!(record.total_score, 280);

    let snapshot = h.store.get("watcher_one").await.unwrap().unwrap();
    assert_eq!(snapshot.following.len(), 2);
    assert!(snapshot.following.contains("fresh_project"));
    assert!(h.store.load_cursor().await.unwrap().contains("watcher_one"));
}

// ---------------------------------------------------------------------------
// Quiet cycles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unchanged_account_publishes_nothing() {
    let graph = MockGraph::new().on_following(7, following_pages(&[&["steady"]]));
    let h = harness(graph, MockWatchlist::new(), 4, false);
    seed(&h.store, 7, "watcher_one", &["steady"]).await;

    let stats = h.watcher.run_cycle().await.unwrap();

    assert_eq!(stats.accounts_synced, 1);
    assert_eq!(stats.records_published, 0);
    assert_eq!(stats.snapshots_written, 0, "unchanged snapshots are not rewritten");
    assert_eq!(h.sink.batch_count(), 0, "sinks never see an empty batch");
    assert_eq!(h.graph.search_calls(), 0, "sweep stays off by default");
    assert!(h.store.load_cursor().await.unwrap().contains("watcher_one"));
}

#[tokio::test]
async fn unfollow_only_updates_the_snapshot_silently() {
    let graph = MockGraph::new().on_following(7, following_pages(&[&["kept"]]));
    let h = harness(graph, MockWatchlist::new(), 4, false);
    seed(&h.store, 7, "watcher_one", &["kept", "dropped"]).await;

    let stats = h.watcher.run_cycle().await.unwrap();

    assert_eq!(stats.unfollows, 1);
    assert_eq!(stats.new_follows, 0);
    assert_eq!(stats.records_published, 0);
    assert_eq!(stats.snapshots_written, 1);
    let snapshot = h.store.get("watcher_one").await.unwrap().unwrap();
    assert!(!snapshot.following.contains("dropped"));
}

#[tokio::test]
async fn empty_store_is_a_quiet_noop_cycle() {
    let h = harness(MockGraph::new(), MockWatchlist::new(), 4, false);

    let stats = h.watcher.run_cycle().await.unwrap();

    assert_eq!(stats.batch_size, 0);
    assert_eq!(h.graph.following_calls(), 0);
    assert_eq!(h.sink.batch_count(), 0);
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_account_keeps_its_snapshot_and_spot_in_the_rotation() {
    // "broken_watch" has no pages registered, which surfaces as an
    // upstream error scoped to that account.
    let graph = MockGraph::new()
        .on_following(7, following_pages(&[&["x", "new_one"]]))
        .on_metrics(profile("new_one", "", 150, None));
    let h = harness(graph, MockWatchlist::new(), 4, false);
    seed(&h.store, 7, "steady_watch", &["x"]).await;
    seed(&h.store, 8, "broken_watch", &["x"]).await;

    let stats = h.watcher.run_cycle().await.unwrap();

    assert_eq!(stats.accounts_synced, 1);
    assert_eq!(stats.accounts_failed, 1);
    assert_eq!(stats.records_published, 1);

    let untouched = h.store.get("broken_watch").await.unwrap().unwrap();
    assert_eq!(untouched.following.len(), 1, "failed sync must not alter the snapshot");
    let cursor = h.store.load_cursor().await.unwrap();
    assert!(cursor.contains("steady_watch"));
    assert!(!cursor.contains("broken_watch"), "failed accounts are retried next cycle");
}

#[tokio::test]
async fn auth_failure_fails_the_cycle_and_preserves_state() {
    let graph = MockGraph::new()
        .on_following(7, following_pages(&[&["x"]]))
        .fail_following_on(
            0,
            TwitterError::Unauthorized {
                status: 401,
                message: "revoked".to_string(),
            },
        );
    let h = harness(graph, MockWatchlist::new(), 4, false);
    seed(&h.store, 7, "watcher_one", &["x"]).await;

    let err = h.watcher.run_cycle().await.unwrap_err();

    assert!(err.chain().any(|cause| matches!(
        cause.downcast_ref::<WatchError>(),
        Some(WatchError::Auth(_))
    )));
    assert_eq!(h.sink.batch_count(), 0);
    assert!(
        h.store.load_cursor().await.unwrap().is_empty(),
        "cursor must not advance on a fatal cycle"
    );
}

#[tokio::test]
async fn metrics_failure_fails_the_cycle_without_touching_snapshots() {
    let graph = MockGraph::new()
        .on_following(7, following_pages(&[&["old_friend", "fresh_project"]]))
        .fail_metrics_on(
            0,
            TwitterError::Api {
                status: 500,
                message: "flaky".to_string(),
            },
        );
    let h = harness(graph, MockWatchlist::new(), 4, false);
    seed(&h.store, 7, "watcher_one", &["old_friend"]).await;

    let err = h.watcher.run_cycle().await.unwrap_err();

    assert!(err.to_string().contains("candidate metrics"));
    let snapshot = h.store.get("watcher_one").await.unwrap().unwrap();
    assert!(
        !snapshot.following.contains("fresh_project"),
        "snapshot must not advance past unscored follows"
    );
    assert!(h.store.load_cursor().await.unwrap().is_empty());
}

#[tokio::test]
async fn candidates_without_profiles_are_dropped_not_scored() {
    // The new follow vanished before the profile lookup, so the metrics
    // response simply omits it.
    let graph =
        MockGraph::new().on_following(7, following_pages(&[&["old_friend", "suspended_acct"]]));
    let h = harness(graph, MockWatchlist::new(), 4, false);
    seed(&h.store, 7, "watcher_one", &["old_friend"]).await;

    let stats = h.watcher.run_cycle().await.unwrap();

    assert_eq!(stats.new_follows, 1);
    assert_eq!(stats.records_published, 0);
    assert_eq!(h.sink.batch_count(), 0);
    let snapshot = h.store.get("watcher_one").await.unwrap().unwrap();
    assert!(
        snapshot.following.contains("suspended_acct"),
        "the ghost is absorbed so it is not re-reported every cycle"
    );
}

#[tokio::test]
async fn one_failing_sink_does_not_block_the_others_or_the_snapshot() {
    let graph = MockGraph::new()
        .on_following(7, following_pages(&[&["old_friend", "fresh_project"]]))
        .on_metrics(profile("fresh_project", "", 150, None));
    let store = Arc::new(MemoryStore::new());
    seed(&store, 7, "watcher_one", &["old_friend"]).await;

    let recording = Arc::new(RecordingSink::new());
    let failing: Arc<dyn ResultSink> = Arc::new(RecordingSink::new().failing());
    let working: Arc<dyn ResultSink> = recording.clone();
    let watcher = Watcher::new(
        store.clone(),
        Arc::new(graph),
        Arc::new(MockWatchlist::new()),
        vec![failing, working],
        &config(4, false),
    );

    let stats = watcher.run_cycle().await.unwrap();

    assert_eq!(stats.records_published, 1);
    assert_eq!(recording.batch_count(), 1, "later sinks still run");
    let snapshot = store.get("watcher_one").await.unwrap().unwrap();
    assert!(snapshot.following.contains("fresh_project"));
}

// ---------------------------------------------------------------------------
// Rotation across cycles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rotation_visits_everyone_before_wrapping() {
    let graph = MockGraph::new()
        .on_following(1, following_pages(&[&["a"]]))
        .on_following(2, following_pages(&[&["b"]]));
    let h = harness(graph, MockWatchlist::new(), 1, false);
    seed(&h.store, 1, "first_watch", &["a"]).await;
    seed(&h.store, 2, "second_watch", &["b"]).await;

    let one = h.watcher.run_cycle().await.unwrap();
    let two = h.watcher.run_cycle().await.unwrap();
    assert!(!one.rotation_wrapped);
    assert!(!two.rotation_wrapped);
    assert_eq!(h.store.load_cursor().await.unwrap().len(), 2);

    let three = h.watcher.run_cycle().await.unwrap();
    assert!(three.rotation_wrapped, "third cycle starts a fresh pass");
    assert_eq!(h.store.load_cursor().await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconcile_seeds_joiners_and_deletes_leavers() {
    let graph = MockGraph::new()
        .on_user(api_user("9", "newcomer"))
        .on_following(9, following_pages(&[&["seed_follow"]]));
    let h = harness(
        graph,
        MockWatchlist::new().with_account("newcomer", 0),
        4,
        false,
    );
    seed(&h.store, 5, "old_timer", &["whoever"]).await;

    h.watcher.reconcile().await.unwrap();

    assert_eq!(h.store.list_handles().await.unwrap(), vec!["newcomer"]);
    let account = h.store.get("newcomer").await.unwrap().unwrap();
    assert_eq!(account.user_id, 9);
    assert!(account.following.contains("seed_follow"));
    assert_eq!(h.sink.batch_count(), 0, "seeding publishes nothing");
}

#[tokio::test]
async fn reconcile_continues_past_accounts_that_fail_to_seed() {
    // "fragile" resolves but has no following pages registered, so its
    // seed fetch fails with an upstream error and the rest proceed.
    let graph = MockGraph::new()
        .on_user(api_user("11", "fragile"))
        .on_user(api_user("12", "sturdy"))
        .on_following(12, following_pages(&[&["anchor"]]));
    let h = harness(
        graph,
        MockWatchlist::new()
            .with_account("fragile", 0)
            .with_account("sturdy", 0),
        4,
        false,
    );

    h.watcher.reconcile().await.unwrap();

    assert!(h.store.get("fragile").await.unwrap().is_none());
    assert!(h.store.get("sturdy").await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Keyword sweep
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_authors_ride_the_same_scoring_path() {
    let graph = MockGraph::new()
        .on_following(7, following_pages(&[&["quiet"]]))
        .on_search(vec![search_page(
            vec![search_author("low_volume", 3), search_author("veteran", 4000)],
            None,
        )]);
    let h = harness(
        graph,
        MockWatchlist::new().with_keyword("airdrop", 25),
        4,
        true,
    );
    seed(&h.store, 7, "watcher_one", &["quiet"]).await;

    let stats = h.watcher.run_cycle().await.unwrap();

    assert_eq!(stats.sweep_candidates, 1, "high-volume authors are filtered out");
    assert_eq!(stats.records_published, 1);
    let records = h.sink.published();
    assert_eq!(records[0].tracked_handle, "search");
    assert_eq!(records[0].followed_handle, "low_volume");
    // 50 followers scores 100, a missing creation date scores the floor 6.
    assert_eq!(records[0].total_score, 106);
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn requested_shutdown_stops_the_loop_before_the_next_cycle() {
    let h = harness(MockGraph::new(), MockWatchlist::new(), 4, false);

    h.watcher.request_shutdown();
    h.watcher
        .run(std::time::Duration::from_secs(3600))
        .await
        .unwrap();

    assert_eq!(h.graph.following_calls(), 0);
}
