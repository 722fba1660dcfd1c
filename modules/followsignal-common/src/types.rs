use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

// --- Accounts ---

/// A watched account together with its last known following snapshot.
///
/// Owned by the snapshot store: created when an operator adds the handle to
/// the watch list, deleted when the handle is removed. The `following` set is
/// overwritten only after a complete fetch+diff cycle, never from a partial
/// page sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedAccount {
    /// Stable numeric id assigned by the upstream graph.
    pub user_id: i64,
    /// Lookup key. Mutable upstream, unique in the store.
    pub handle: String,
    pub display_name: String,
    /// Handles this account followed as of the last successful sync.
    pub following: HashSet<String>,
}

impl TrackedAccount {
    pub fn new(user_id: i64, handle: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            handle: handle.into(),
            display_name: display_name.into(),
            following: HashSet::new(),
        }
    }
}

/// Identity fields returned by a batch handle lookup, before any following
/// snapshot exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAccount {
    pub user_id: i64,
    pub handle: String,
    pub display_name: String,
}

/// Profile metadata harvested for scoring: bio text, audience size, account
/// age, and every link found on the profile (bio links included),
/// de-duplicated in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMetrics {
    pub handle: String,
    pub description: String,
    pub follower_count: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub urls: Vec<String>,
}

// --- Rotation cursor ---

/// Handles already visited in the current sampling rotation.
///
/// Persisted as a JSON string array under [`RotationCursor::STATE_KEY`] so a
/// restart resumes the rotation instead of restarting it. A `BTreeSet` keeps
/// the encoded form stable for a given membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationCursor {
    visited: BTreeSet<String>,
}

impl RotationCursor {
    /// Well-known key in the watcher state table.
    pub const STATE_KEY: &'static str = "rotation_cursor";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        let visited: BTreeSet<String> = serde_json::from_str(raw)?;
        Ok(Self { visited })
    }

    pub fn encode(&self) -> String {
        // BTreeSet of strings always serializes.
        serde_json::to_string(&self.visited).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.visited.contains(handle)
    }

    pub fn mark(&mut self, handle: impl Into<String>) {
        self.visited.insert(handle.into());
    }

    pub fn extend(&mut self, handles: impl IntoIterator<Item = String>) {
        self.visited.extend(handles);
    }

    pub fn clear(&mut self) {
        self.visited.clear();
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    /// Drop handles no longer on the watch list so a removed account can
    /// never wedge the rotation. Returns how many were pruned.
    pub fn retain_known(&mut self, watchlist: &HashSet<String>) -> usize {
        let before = self.visited.len();
        self.visited.retain(|h| watchlist.contains(h));
        before - self.visited.len()
    }

    pub fn visited(&self) -> &BTreeSet<String> {
        &self.visited
    }
}

// --- Scoring ---

/// A newly observed follow edge, enriched with profile metadata and ready for
/// scoring. Ephemeral: built during a cycle, scored, forwarded, dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCandidate {
    /// Watch-list handle that created the edge.
    pub tracked_handle: String,
    /// Handle on the receiving end of the new follow.
    pub followed_handle: String,
    pub discovered_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub follower_count: i64,
    pub description: String,
    pub urls: Vec<String>,
}

/// Per-heuristic point contributions for one candidate. `total` is the only
/// quantity the leaderboard filter looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub keyword: i64,
    pub account_age: i64,
    pub follower: i64,
    pub url: i64,
    pub known_source: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.keyword + self.account_age + self.follower + self.url + self.known_source
    }
}

/// Weighted phrase matched against candidate descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordWeight {
    pub phrase: String,
    pub points: i64,
}

/// Bonus awarded when a specific watch-list account is the one doing the
/// following.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountWeight {
    pub handle: String,
    pub points: i64,
}

/// One scored discovery, shaped for the result sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct DiscoveryRecord {
    pub tracked_handle: String,
    pub tracked_points: i64,
    pub followed_handle: String,
    pub followed_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_at_points: i64,
    pub follower_count: i64,
    pub follower_points: i64,
    pub description: String,
    pub description_points: i64,
    /// Accepted urls only, each carrying an explicit scheme.
    pub urls: Vec<String>,
    pub url_points: i64,
    pub total_score: i64,
}
