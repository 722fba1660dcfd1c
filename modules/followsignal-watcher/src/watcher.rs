//! Cycle orchestration: plan a batch, sync each account, score what
//! changed, deliver, persist.
//!
//! Ordering is deliberate. Snapshots and the rotation cursor are written
//! only after sink delivery was attempted, so a crash mid-cycle re-detects
//! the same follows next time instead of losing them. Duplicate rows in
//! the results table are the accepted cost; the leaderboard filter keeps
//! duplicates off the board.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use followsignal_common::{
    AppConfig, DiscoveryCandidate, DiscoveryRecord, TrackedAccount, WatchError,
};
use followsignal_store::SnapshotStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn};

use crate::diff::diff_following;
use crate::fetcher::{FollowFetcher, RetryPolicy};
use crate::scheduler::Rotation;
use crate::scorer::{ScoredCandidate, Scorer};
use crate::sinks::ResultSink;
use crate::sweep;
use crate::traits::SocialGraph;
use crate::watchlist::WatchlistSource;

/// Counters for one sync cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub batch_size: usize,
    pub accounts_synced: usize,
    pub accounts_failed: usize,
    pub new_follows: usize,
    pub unfollows: usize,
    pub sweep_candidates: usize,
    pub records_published: usize,
    pub snapshots_written: usize,
    pub rotation_wrapped: bool,
}

impl std::fmt::Display for CycleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Sync Cycle Complete ===")?;
        writeln!(f, "Batch planned:      {}", self.batch_size)?;
        writeln!(f, "Accounts synced:    {}", self.accounts_synced)?;
        writeln!(f, "Accounts failed:    {}", self.accounts_failed)?;
        writeln!(f, "New follows:        {}", self.new_follows)?;
        writeln!(f, "Unfollows:          {}", self.unfollows)?;
        writeln!(f, "Sweep candidates:   {}", self.sweep_candidates)?;
        writeln!(f, "Records published:  {}", self.records_published)?;
        writeln!(f, "Snapshots written:  {}", self.snapshots_written)?;
        if self.rotation_wrapped {
            writeln!(f, "Rotation wrapped, next cycle starts a fresh pass")?;
        }
        Ok(())
    }
}

/// The watch loop: owns the store, the graph client, the watch-list source
/// and the sinks, and turns them into discovery records on a schedule.
pub struct Watcher {
    store: Arc<dyn SnapshotStore>,
    graph: Arc<dyn SocialGraph>,
    fetcher: FollowFetcher,
    watchlist: Arc<dyn WatchlistSource>,
    sinks: Vec<Arc<dyn ResultSink>>,
    rotation: Rotation,
    sweep_enabled: bool,
    rng: Mutex<StdRng>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Watcher {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        graph: Arc<dyn SocialGraph>,
        watchlist: Arc<dyn WatchlistSource>,
        sinks: Vec<Arc<dyn ResultSink>>,
        config: &AppConfig,
    ) -> Self {
        let fetcher = FollowFetcher::new(Arc::clone(&graph), RetryPolicy::from_config(config));
        Self {
            store,
            graph,
            fetcher,
            watchlist,
            sinks,
            rotation: Rotation::new(config.sync_batch_size),
            sweep_enabled: config.sweep_enabled,
            rng: Mutex::new(StdRng::from_os_rng()),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Request a graceful stop: the current account finishes, the cycle
    /// winds down, the loop exits.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Bring the snapshot store in line with the watch list: resolve and
    /// seed accounts that joined, delete accounts that left. Seeding
    /// produces no discoveries; a new account starts scoring from its next
    /// sync.
    pub async fn reconcile(&self) -> Result<()> {
        let desired = self
            .watchlist
            .tracked_accounts()
            .await
            .context("Failed to load the watch list")?;
        let desired_handles: HashSet<String> =
            desired.iter().map(|a| a.handle.clone()).collect();
        let stored: HashSet<String> = self.store.list_handles().await?.into_iter().collect();

        let departed: Vec<String> = stored.difference(&desired_handles).cloned().collect();
        if !departed.is_empty() {
            info!(count = departed.len(), "Removing departed accounts");
            self.store.delete(&departed).await?;
        }

        let joined: Vec<String> = desired_handles.difference(&stored).cloned().collect();
        if joined.is_empty() {
            return Ok(());
        }

        info!(count = joined.len(), "Seeding snapshots for new accounts");
        let resolved = self
            .fetcher
            .resolve_accounts(&joined)
            .await
            .context("Failed to resolve new watch-list handles")?;

        let resolved_handles: HashSet<&str> =
            resolved.iter().map(|a| a.handle.as_str()).collect();
        for handle in &joined {
            if !resolved_handles.contains(handle.as_str()) {
                warn!(handle = %handle, "Watch-list handle did not resolve, skipping");
            }
        }

        for account in resolved {
            if self.is_shutdown_requested() {
                info!("Shutdown requested, stopping reconciliation");
                return Ok(());
            }
            match self.fetcher.fetch_following(account.user_id).await {
                Ok(following) => {
                    let mut tracked =
                        TrackedAccount::new(account.user_id, account.handle, account.display_name);
                    tracked.following = following;
                    self.store.put(&tracked).await?;
                    info!(
                        handle = %tracked.handle,
                        count = tracked.following.len(),
                        "Seeded initial snapshot"
                    );
                }
                Err(e) if e.is_fatal() => {
                    return Err(
                        anyhow::Error::from(e).context("Initial snapshot fetch hit a fatal error")
                    );
                }
                Err(e) => {
                    warn!(
                        handle = %account.handle,
                        error = %e,
                        "Initial snapshot fetch failed, will retry next startup"
                    );
                }
            }
        }

        Ok(())
    }

    /// One complete sync cycle.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let mut stats = CycleStats::default();

        let handles = self.store.list_handles().await?;
        if handles.is_empty() {
            info!("No tracked accounts in the store, nothing to sync");
            return Ok(stats);
        }

        let mut cursor = self.store.load_cursor().await?;
        let plan = {
            let mut rng = self.rng.lock().await;
            self.rotation.plan(&handles, &mut cursor, &mut *rng)
        };
        stats.batch_size = plan.batch.len();
        stats.rotation_wrapped = plan.wrapped;
        if plan.wrapped {
            info!("Rotation exhausted, starting a fresh pass over the watch list");
        }

        let weights = self
            .watchlist
            .tracked_accounts()
            .await
            .context("Failed to load source weights")?;
        let keywords = self
            .watchlist
            .keywords()
            .await
            .context("Failed to load the keyword table")?;
        let scorer = Scorer::new(&keywords, &weights);

        // Secondary discovery first; its failures never touch the follow path.
        let mut sweep_candidates = Vec::new();
        if self.sweep_enabled && !keywords.is_empty() {
            let query = {
                let mut rng = self.rng.lock().await;
                sweep::build_query(&keywords, &mut *rng)
            };
            sweep_candidates = sweep::run_sweep(self.graph.as_ref(), &query).await;
            stats.sweep_candidates = sweep_candidates.len();
        }

        let now = Utc::now();
        let mut follow_candidates: Vec<DiscoveryCandidate> = Vec::new();
        let mut synced: Vec<String> = Vec::new();
        let mut changed: Vec<TrackedAccount> = Vec::new();

        for handle in &plan.batch {
            if self.is_shutdown_requested() {
                info!("Shutdown requested, cutting the batch short");
                break;
            }

            let Some(account) = self.store.get(handle).await? else {
                warn!(handle = %handle, "Planned account vanished from the store, skipping");
                continue;
            };

            match self
                .sync_account(&account, now, &mut follow_candidates, &mut stats)
                .await
            {
                Ok(updated) => {
                    stats.accounts_synced += 1;
                    synced.push(account.handle.clone());
                    if let Some(updated) = updated {
                        changed.push(updated);
                    }
                }
                Err(e) if e.is_fatal() => {
                    return Err(anyhow::Error::from(e).context("Fatal error during account sync"));
                }
                Err(e) => {
                    stats.accounts_failed += 1;
                    warn!(
                        handle = %account.handle,
                        error = %e,
                        "Account sync failed, snapshot untouched"
                    );
                }
            }
        }

        let records = self
            .score_candidates(&scorer, follow_candidates, sweep_candidates, now)
            .await?;
        stats.records_published = records.len();

        if !records.is_empty() {
            for sink in &self.sinks {
                if let Err(e) = sink.publish(&records).await {
                    warn!(sink = sink.name(), error = %e, "Sink delivery failed");
                }
            }
        }

        for account in &changed {
            self.store
                .put(account)
                .await
                .with_context(|| format!("Failed to persist snapshot for {}", account.handle))?;
            stats.snapshots_written += 1;
        }
        cursor.extend(synced);
        self.store.save_cursor(&cursor).await?;

        Ok(stats)
    }

    /// Sync one account: fetch the live following list, diff against the
    /// stored snapshot, queue a discovery skeleton per new follow. Returns
    /// the updated account when the snapshot changed.
    async fn sync_account(
        &self,
        account: &TrackedAccount,
        now: DateTime<Utc>,
        candidates: &mut Vec<DiscoveryCandidate>,
        stats: &mut CycleStats,
    ) -> std::result::Result<Option<TrackedAccount>, WatchError> {
        let current = self.fetcher.fetch_following(account.user_id).await?;
        let delta = diff_following(&account.following, &current);
        if delta.is_empty() {
            return Ok(None);
        }

        info!(
            handle = %account.handle,
            added = delta.added.len(),
            removed = delta.removed.len(),
            "Following list changed"
        );
        stats.new_follows += delta.added.len();
        stats.unfollows += delta.removed.len();

        for followed in delta.added {
            candidates.push(DiscoveryCandidate {
                tracked_handle: account.handle.clone(),
                followed_handle: followed,
                discovered_at: now,
                created_at: None,
                follower_count: 0,
                description: String::new(),
                urls: Vec::new(),
            });
        }

        let mut updated = account.clone();
        updated.following = current;
        Ok(Some(updated))
    }

    /// Flesh out follow skeletons with profile metadata, then run both
    /// discovery channels through the same scoring table.
    async fn score_candidates(
        &self,
        scorer: &Scorer,
        follow_candidates: Vec<DiscoveryCandidate>,
        sweep_candidates: Vec<DiscoveryCandidate>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiscoveryRecord>> {
        let mut handles: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for candidate in &follow_candidates {
            if seen.insert(candidate.followed_handle.clone()) {
                handles.push(candidate.followed_handle.clone());
            }
        }

        let metrics = self
            .fetcher
            .fetch_metrics(&handles)
            .await
            .context("Failed to fetch candidate metrics")?;

        let mut records = Vec::new();
        for mut candidate in follow_candidates {
            let Some(profile) = metrics.get(&candidate.followed_handle) else {
                warn!(
                    handle = %candidate.followed_handle,
                    "Candidate profile unavailable, skipping"
                );
                continue;
            };
            candidate.description = profile.description.clone();
            candidate.follower_count = profile.follower_count;
            candidate.created_at = profile.created_at;
            candidate.urls = profile.urls.clone();
            records.push(build_record(scorer.score(candidate, now)));
        }
        for candidate in sweep_candidates {
            records.push(build_record(scorer.score(candidate, now)));
        }

        Ok(records)
    }

    /// Run sync cycles until shutdown. Only a fatal failure ends the loop
    /// early; everything else logs and waits for the next interval.
    pub async fn run(&self, interval: Duration) -> Result<()> {
        loop {
            if self.is_shutdown_requested() {
                info!("Shutdown requested, stopping watch loop");
                return Ok(());
            }

            match self.run_cycle().await {
                Ok(stats) => info!("{stats}"),
                Err(e) => {
                    if is_fatal(&e) {
                        error!(error = %e, "Fatal failure, stopping watch loop");
                        return Err(e);
                    }
                    error!(error = %e, "Sync cycle failed, will retry next interval");
                }
            }

            if self.is_shutdown_requested() {
                info!("Shutdown requested, stopping watch loop");
                return Ok(());
            }

            info!(wait_secs = interval.as_secs(), "Cycle complete, waiting");
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.wake.notified() => {}
            }
        }
    }

    /// [`Self::run`] wired to process signals: Ctrl+C or SIGTERM finishes
    /// the current cycle and exits cleanly.
    pub async fn run_until_shutdown(&self, interval: Duration) -> Result<()> {
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, finishing the current cycle");
            shutdown.store(true, Ordering::SeqCst);
            wake.notify_one();
        });

        self.run(interval).await
    }
}

/// Assemble the sink-facing record from a scored candidate.
fn build_record(scored: ScoredCandidate) -> DiscoveryRecord {
    let ScoredCandidate {
        candidate,
        breakdown,
        accepted_urls,
    } = scored;
    DiscoveryRecord::builder()
        .tracked_handle(candidate.tracked_handle)
        .tracked_points(breakdown.known_source)
        .followed_handle(candidate.followed_handle)
        .followed_at(candidate.discovered_at)
        .created_at(candidate.created_at)
        .created_at_points(breakdown.account_age)
        .follower_count(candidate.follower_count)
        .follower_points(breakdown.follower)
        .description(candidate.description)
        .description_points(breakdown.keyword)
        .urls(accepted_urls)
        .url_points(breakdown.url)
        .total_score(breakdown.total())
        .build()
}

/// A cycle error is fatal when any link of its chain is a fatal
/// [`WatchError`].
fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<WatchError>()
            .map_or(false, |w| w.is_fatal())
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use followsignal_common::ScoreBreakdown;

    #[test]
    fn fatal_errors_are_found_anywhere_in_the_chain() {
        let fatal = anyhow::Error::from(WatchError::Auth("revoked".to_string()))
            .context("Fatal error during account sync");
        assert!(is_fatal(&fatal));

        let transient = anyhow::Error::from(WatchError::Network("reset".to_string()))
            .context("Account sync failed");
        assert!(!is_fatal(&transient));

        let unrelated = anyhow::anyhow!("sink exploded");
        assert!(!is_fatal(&unrelated));
    }

    #[test]
    fn records_carry_the_breakdown_into_their_point_columns() {
        let scored = ScoredCandidate {
            candidate: DiscoveryCandidate {
                tracked_handle: "watcher_one".to_string(),
                followed_handle: "fresh_project".to_string(),
                discovered_at: Utc::now(),
                created_at: None,
                follower_count: 120,
                description: "launching soon".to_string(),
                urls: vec!["discord.gg/abc".to_string()],
            },
            breakdown: ScoreBreakdown {
                keyword: 30,
                account_age: 6,
                follower: 100,
                url: 40,
                known_source: 50,
            },
            accepted_urls: vec!["https://discord.gg/abc".to_string()],
        };

        let record = build_record(scored);
        assert_eq!(record.description_points, 30);
        assert_eq!(record.created_at_points, 6);
        assert_eq!(record.follower_points, 100);
        assert_eq!(record.url_points, 40);
        assert_eq!(record.tracked_points, 50);
        assert_eq!(record.total_score, 226);
        assert_eq!(record.urls, vec!["https://discord.gg/abc"]);
    }
}
