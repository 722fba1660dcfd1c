// Test mocks for the watcher pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockGraph (SocialGraph) — scripted pages, call-indexed failures
// - MockWatchlist (WatchlistSource) — fixed tables with failure toggles
// - RecordingSink (ResultSink) — captures published batches
//
// Plus fixture helpers for users, pages and candidates. The snapshot store
// needs no mock: tests run against the real MemoryStore.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use followsignal_common::{AccountWeight, DiscoveryRecord, KeywordWeight};
use twitter_client::types::PublicMetrics;
use twitter_client::{ApiUser, FollowingPage, SearchPage, TwitterError};

use crate::sinks::ResultSink;
use crate::traits::SocialGraph;
use crate::watchlist::WatchlistSource;

// ---------------------------------------------------------------------------
// MockGraph
// ---------------------------------------------------------------------------

struct GraphInner {
    /// Following pages per user id. The page index is addressed by the
    /// request token: `None` serves page 0, `"page-N"` serves page N, so a
    /// retried token re-serves the same page.
    following: HashMap<i64, Vec<FollowingPage>>,
    users: HashMap<String, ApiUser>,
    metrics: HashMap<String, ApiUser>,
    search_pages: VecDeque<SearchPage>,
    /// Failures keyed by zero-based call number, consumed when they fire.
    fail_following: HashMap<u32, TwitterError>,
    fail_users: HashMap<u32, TwitterError>,
    fail_metrics: HashMap<u32, TwitterError>,
    fail_search: HashMap<u32, TwitterError>,
    following_calls: u32,
    users_calls: u32,
    metrics_calls: u32,
    search_calls: u32,
    /// Every token the following endpoint was asked for, errors included.
    following_tokens: Vec<Option<String>>,
    session_resets: u32,
}

/// Scripted social graph. Thread-safe via interior Mutex.
/// Builder pattern: `.on_following()`, `.on_user()`, `.on_metrics()`,
/// `.on_search()`, plus `.fail_*_on(call, err)` for injected failures.
pub struct MockGraph {
    inner: Mutex<GraphInner>,
}

impl MockGraph {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GraphInner {
                following: HashMap::new(),
                users: HashMap::new(),
                metrics: HashMap::new(),
                search_pages: VecDeque::new(),
                fail_following: HashMap::new(),
                fail_users: HashMap::new(),
                fail_metrics: HashMap::new(),
                fail_search: HashMap::new(),
                following_calls: 0,
                users_calls: 0,
                metrics_calls: 0,
                search_calls: 0,
                following_tokens: Vec::new(),
                session_resets: 0,
            }),
        }
    }

    pub fn on_following(self, user_id: i64, pages: Vec<FollowingPage>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .following
            .insert(user_id, pages);
        self
    }

    /// Register a user for identity lookups.
    pub fn on_user(self, user: ApiUser) -> Self {
        self.inner
            .lock()
            .unwrap()
            .users
            .insert(user.username.clone(), user);
        self
    }

    /// Register a profile for metrics lookups.
    pub fn on_metrics(self, user: ApiUser) -> Self {
        self.inner
            .lock()
            .unwrap()
            .metrics
            .insert(user.username.clone(), user);
        self
    }

    /// Queue search pages, served in order regardless of token.
    pub fn on_search(self, pages: Vec<SearchPage>) -> Self {
        self.inner.lock().unwrap().search_pages.extend(pages);
        self
    }

    pub fn fail_following_on(self, call: u32, err: TwitterError) -> Self {
        self.inner.lock().unwrap().fail_following.insert(call, err);
        self
    }

    pub fn fail_users_on(self, call: u32, err: TwitterError) -> Self {
        self.inner.lock().unwrap().fail_users.insert(call, err);
        self
    }

    pub fn fail_metrics_on(self, call: u32, err: TwitterError) -> Self {
        self.inner.lock().unwrap().fail_metrics.insert(call, err);
        self
    }

    pub fn fail_search_on(self, call: u32, err: TwitterError) -> Self {
        self.inner.lock().unwrap().fail_search.insert(call, err);
        self
    }

    // --- Assertion helpers ---

    pub fn following_tokens(&self) -> Vec<Option<String>> {
        self.inner.lock().unwrap().following_tokens.clone()
    }

    pub fn following_calls(&self) -> u32 {
        self.inner.lock().unwrap().following_calls
    }

    pub fn search_calls(&self) -> u32 {
        self.inner.lock().unwrap().search_calls
    }

    pub fn session_resets(&self) -> u32 {
        self.inner.lock().unwrap().session_resets
    }
}

#[async_trait]
impl SocialGraph for MockGraph {
    async fn following_page(
        &self,
        user_id: i64,
        pagination_token: Option<&str>,
    ) -> twitter_client::Result<FollowingPage> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .following_tokens
            .push(pagination_token.map(|t| t.to_string()));
        let call = inner.following_calls;
        inner.following_calls += 1;
        if let Some(err) = inner.fail_following.remove(&call) {
            return Err(err);
        }

        let pages = inner.following.get(&user_id).ok_or_else(|| TwitterError::Api {
            status: 404,
            message: format!("MockGraph: no following pages registered for {user_id}"),
        })?;
        let index = match pagination_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(0),
        };
        pages.get(index).cloned().ok_or_else(|| TwitterError::Api {
            status: 404,
            message: format!("MockGraph: no page {index} registered for {user_id}"),
        })
    }

    async fn users_by_handles(&self, handles: &[String]) -> twitter_client::Result<Vec<ApiUser>> {
        let mut inner = self.inner.lock().unwrap();
        let call = inner.users_calls;
        inner.users_calls += 1;
        if let Some(err) = inner.fail_users.remove(&call) {
            return Err(err);
        }
        // Unknown handles are silently absent, like the real endpoint.
        Ok(handles
            .iter()
            .filter_map(|h| inner.users.get(h).cloned())
            .collect())
    }

    async fn user_metrics(&self, handles: &[String]) -> twitter_client::Result<Vec<ApiUser>> {
        let mut inner = self.inner.lock().unwrap();
        let call = inner.metrics_calls;
        inner.metrics_calls += 1;
        if let Some(err) = inner.fail_metrics.remove(&call) {
            return Err(err);
        }
        Ok(handles
            .iter()
            .filter_map(|h| inner.metrics.get(h).cloned())
            .collect())
    }

    async fn search_recent(
        &self,
        _query: &str,
        _start_time: DateTime<Utc>,
        _next_token: Option<&str>,
    ) -> twitter_client::Result<SearchPage> {
        let mut inner = self.inner.lock().unwrap();
        let call = inner.search_calls;
        inner.search_calls += 1;
        if let Some(err) = inner.fail_search.remove(&call) {
            return Err(err);
        }
        Ok(inner.search_pages.pop_front().unwrap_or(SearchPage {
            tweets: Vec::new(),
            users: Vec::new(),
            next_token: None,
        }))
    }

    async fn reset_session(&self) -> twitter_client::Result<()> {
        self.inner.lock().unwrap().session_resets += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockWatchlist
// ---------------------------------------------------------------------------

/// Fixed watch list and keyword table with failure toggles.
pub struct MockWatchlist {
    accounts: Vec<AccountWeight>,
    keywords: Vec<KeywordWeight>,
    fail_accounts: bool,
    fail_keywords: bool,
}

impl MockWatchlist {
    pub fn new() -> Self {
        Self {
            accounts: Vec::new(),
            keywords: Vec::new(),
            fail_accounts: false,
            fail_keywords: false,
        }
    }

    pub fn with_account(mut self, handle: &str, points: i64) -> Self {
        self.accounts.push(AccountWeight {
            handle: handle.to_string(),
            points,
        });
        self
    }

    pub fn with_keyword(mut self, phrase: &str, points: i64) -> Self {
        self.keywords.push(KeywordWeight {
            phrase: phrase.to_string(),
            points,
        });
        self
    }

    pub fn failing_accounts(mut self) -> Self {
        self.fail_accounts = true;
        self
    }

    pub fn failing_keywords(mut self) -> Self {
        self.fail_keywords = true;
        self
    }
}

#[async_trait]
impl WatchlistSource for MockWatchlist {
    async fn tracked_accounts(&self) -> Result<Vec<AccountWeight>> {
        if self.fail_accounts {
            bail!("MockWatchlist: tracked_accounts forced failure");
        }
        Ok(self.accounts.clone())
    }

    async fn keywords(&self) -> Result<Vec<KeywordWeight>> {
        if self.fail_keywords {
            bail!("MockWatchlist: keywords forced failure");
        }
        Ok(self.keywords.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Captures every published batch. Thread-safe via interior Mutex.
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<DiscoveryRecord>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Make every publish return an error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    // --- Assertion helpers ---

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Every published record, flattened across batches.
    pub fn published(&self) -> Vec<DiscoveryRecord> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, records: &[DiscoveryRecord]) -> Result<()> {
        if self.fail {
            bail!("RecordingSink: publish forced failure");
        }
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

/// Minimal user object carrying just the identity triple.
pub fn api_user(id: &str, handle: &str) -> ApiUser {
    ApiUser {
        id: id.to_string(),
        name: handle.to_string(),
        username: handle.to_string(),
        description: None,
        created_at: None,
        public_metrics: None,
        entities: None,
    }
}

/// Profile with the scoring fields filled in.
pub fn profile(
    handle: &str,
    description: &str,
    follower_count: i64,
    created_at: Option<DateTime<Utc>>,
) -> ApiUser {
    ApiUser {
        id: "1000".to_string(),
        name: handle.to_string(),
        username: handle.to_string(),
        description: Some(description.to_string()),
        created_at,
        public_metrics: Some(PublicMetrics {
            followers_count: follower_count,
            following_count: 0,
            tweet_count: 0,
        }),
        entities: None,
    }
}

/// Search author with a lifetime post count, for sweep filtering.
pub fn search_author(handle: &str, tweet_count: i64) -> ApiUser {
    ApiUser {
        id: "2000".to_string(),
        name: handle.to_string(),
        username: handle.to_string(),
        description: Some(String::new()),
        created_at: None,
        public_metrics: Some(PublicMetrics {
            followers_count: 50,
            following_count: 0,
            tweet_count,
        }),
        entities: None,
    }
}

/// Pages for one following list, chained with `page-N` tokens.
pub fn following_pages(per_page: &[&[&str]]) -> Vec<FollowingPage> {
    per_page
        .iter()
        .enumerate()
        .map(|(i, handles)| FollowingPage {
            users: handles.iter().map(|h| api_user("1000", h)).collect(),
            next_token: if i + 1 < per_page.len() {
                Some(format!("page-{}", i + 1))
            } else {
                None
            },
        })
        .collect()
}

/// One search page with the given authors in its expansion block.
pub fn search_page(authors: Vec<ApiUser>, next_token: Option<&str>) -> SearchPage {
    SearchPage {
        tweets: Vec::new(),
        users: authors,
        next_token: next_token.map(|t| t.to_string()),
    }
}

// ---------------------------------------------------------------------------
// MockGraph self-tests
// ---------------------------------------------------------------------------
