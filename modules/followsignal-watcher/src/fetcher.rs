//! Following-list fetches against the upstream graph, with the retry
//! posture the free API tier forces: long cooldowns on rate limits, linear
//! backoff on transient network failures, immediate abort on auth errors.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use followsignal_common::{AccountMetrics, AppConfig, ResolvedAccount, WatchError};
use rand::Rng;
use tracing::{debug, warn};
use twitter_client::{ApiUser, TwitterError, USER_LOOKUP_LIMIT};

use crate::traits::SocialGraph;

/// Retry posture for one account's following fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Rate-limit cooldowns tolerated per fetch before it gives up.
    pub max_rate_limit_waits: u32,
    /// Sleep after the API reports a rate limit.
    pub cooldown: Duration,
    /// Pause bounds between consecutive following pages, in seconds.
    pub page_delay_secs: RangeInclusive<u64>,
    /// Transient-failure retries per page.
    pub network_retries: u32,
    /// Base pause between network retries, multiplied by the attempt number.
    pub network_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_waits: 3,
            cooldown: Duration::from_secs(1200),
            page_delay_secs: 1..=3,
            network_retries: 2,
            network_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_rate_limit_waits: config.max_rate_limit_waits,
            cooldown: Duration::from_secs(config.rate_limit_cooldown_secs),
            ..Self::default()
        }
    }
}

/// Fetches complete following snapshots and batch profile lookups.
pub struct FollowFetcher {
    graph: Arc<dyn SocialGraph>,
    policy: RetryPolicy,
}

impl FollowFetcher {
    pub fn new(graph: Arc<dyn SocialGraph>, policy: RetryPolicy) -> Self {
        Self { graph, policy }
    }

    /// Fetch the complete set of handles `user_id` follows.
    ///
    /// Pagination runs to exhaustion or not at all: a partial list would
    /// surface as phantom unfollows in the diff, so any give-up drops the
    /// whole fetch. A rate limit pauses for the cooldown, rebuilds the
    /// transport session and resumes from the same page token; the cooldown
    /// budget spans the entire fetch, network retries reset per page.
    pub async fn fetch_following(&self, user_id: i64) -> Result<HashSet<String>, WatchError> {
        let mut following = HashSet::new();
        let mut page_token: Option<String> = None;
        let mut waits: u32 = 0;
        let mut pages: u32 = 0;

        loop {
            let mut net_attempts: u32 = 0;
            let page = loop {
                match self
                    .graph
                    .following_page(user_id, page_token.as_deref())
                    .await
                {
                    Ok(page) => break page,
                    Err(TwitterError::RateLimited) => {
                        waits += 1;
                        if waits > self.policy.max_rate_limit_waits {
                            return Err(WatchError::RateLimitBudget { waits: waits - 1 });
                        }
                        warn!(
                            user_id,
                            wait = waits,
                            cooldown_secs = self.policy.cooldown.as_secs(),
                            "Rate limited, cooling down before resuming"
                        );
                        tokio::time::sleep(self.policy.cooldown).await;
                        if let Err(e) = self.graph.reset_session().await {
                            warn!(error = %e, "Session rebuild after cooldown failed");
                        }
                    }
                    Err(TwitterError::Unauthorized { status, message }) => {
                        return Err(WatchError::Auth(format!("status {status}: {message}")));
                    }
                    Err(TwitterError::Network(message)) => {
                        net_attempts += 1;
                        if net_attempts > self.policy.network_retries {
                            return Err(WatchError::Network(message));
                        }
                        let backoff = self.policy.network_backoff * net_attempts;
                        warn!(
                            user_id,
                            attempt = net_attempts,
                            backoff_secs = backoff.as_secs(),
                            error = %message,
                            "Network error on following page, backing off"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    Err(e) => return Err(WatchError::Upstream(e.to_string())),
                }
            };

            pages += 1;
            for user in &page.users {
                following.insert(user.username.clone());
            }

            match page.next_token {
                Some(token) => {
                    page_token = Some(token);
                    let delay = rand::rng().random_range(self.policy.page_delay_secs.clone());
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
                None => break,
            }
        }

        debug!(user_id, pages, count = following.len(), "Fetched complete following list");
        Ok(following)
    }

    /// Resolve handles to identity fields, in lookup-sized chunks. Handles
    /// the API no longer knows simply do not come back; ids that fail to
    /// parse are skipped with a warning.
    pub async fn resolve_accounts(
        &self,
        handles: &[String],
    ) -> Result<Vec<ResolvedAccount>, WatchError> {
        let mut resolved = Vec::new();

        for chunk in handles.chunks(USER_LOOKUP_LIMIT) {
            let users = self.graph.users_by_handles(chunk).await.map_err(classify)?;
            for user in users {
                match user.id.parse::<i64>() {
                    Ok(user_id) => resolved.push(ResolvedAccount {
                        user_id,
                        handle: user.username,
                        display_name: user.name,
                    }),
                    Err(_) => {
                        warn!(handle = %user.username, id = %user.id, "Skipping user with non-numeric id");
                    }
                }
            }
        }

        Ok(resolved)
    }

    /// Batch profile lookup keyed by handle. Handles the API cannot resolve
    /// are absent from the map, not errors.
    pub async fn fetch_metrics(
        &self,
        handles: &[String],
    ) -> Result<HashMap<String, AccountMetrics>, WatchError> {
        let mut metrics = HashMap::new();

        for chunk in handles.chunks(USER_LOOKUP_LIMIT) {
            let users = self.graph.user_metrics(chunk).await.map_err(classify)?;
            for user in users {
                metrics.insert(user.username.clone(), account_metrics(&user));
            }
        }

        Ok(metrics)
    }
}

/// Flatten one profile into the scoring inputs.
pub(crate) fn account_metrics(user: &ApiUser) -> AccountMetrics {
    AccountMetrics {
        handle: user.username.clone(),
        description: user.description.clone().unwrap_or_default(),
        follower_count: user
            .public_metrics
            .map(|m| m.followers_count)
            .unwrap_or_default(),
        created_at: user.created_at,
        urls: harvest_urls(user),
    }
}

/// Collect every link on the profile: the website field first, then bio
/// links, de-duplicated in first-seen order. The display form is preferred
/// because that is what the invite-link patterns and the blacklist match
/// against; shortener-wrapped forms defeat both.
pub(crate) fn harvest_urls(user: &ApiUser) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let entries = user.entities.iter().flat_map(|e| {
        e.url
            .iter()
            .chain(e.description.iter())
            .flat_map(|block| block.urls.iter())
    });
    for entry in entries {
        let Some(url) = entry.display_url.as_deref().or_else(|| entry.resolved()) else {
            continue;
        };
        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }

    urls
}

/// Map transport errors onto the watch taxonomy. Rate limits here stay
/// plain upstream failures: the lookup endpoints run on normal pacing, only
/// the following fetch earns a cooldown.
fn classify(err: TwitterError) -> WatchError {
    match err {
        TwitterError::Unauthorized { status, message } => {
            WatchError::Auth(format!("status {status}: {message}"))
        }
        TwitterError::Network(message) => WatchError::Network(message),
        other => WatchError::Upstream(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twitter_client::types::{EntityUrls, UrlEntity, UserEntities};

    fn entity(display: Option<&str>, expanded: Option<&str>) -> UrlEntity {
        UrlEntity {
            url: Some("https://t.co/wrapped".to_string()),
            expanded_url: expanded.map(|u| u.to_string()),
            display_url: display.map(|u| u.to_string()),
        }
    }

    fn user_with_entities(entities: UserEntities) -> ApiUser {
        ApiUser {
            id: "42".to_string(),
            name: "Fresh Project".to_string(),
            username: "fresh_project".to_string(),
            description: Some("bio".to_string()),
            created_at: None,
            public_metrics: None,
            entities: Some(entities),
        }
    }

    #[test]
    fn harvest_prefers_display_urls() {
        let user = user_with_entities(UserEntities {
            url: Some(EntityUrls {
                urls: vec![entity(Some("discord.gg/abc"), Some("https://discord.gg/abc"))],
            }),
            description: None,
        });

        assert_eq!(harvest_urls(&user), vec!["discord.gg/abc"]);
    }

    #[test]
    fn harvest_falls_back_to_the_expanded_url() {
        let user = user_with_entities(UserEntities {
            url: None,
            description: Some(EntityUrls {
                urls: vec![entity(None, Some("https://example.org"))],
            }),
        });

        assert_eq!(harvest_urls(&user), vec!["https://example.org"]);
    }

    #[test]
    fn harvest_keeps_website_before_bio_links_and_dedups() {
        let user = user_with_entities(UserEntities {
            url: Some(EntityUrls {
                urls: vec![entity(Some("example.org"), None)],
            }),
            description: Some(EntityUrls {
                urls: vec![
                    entity(Some("example.org"), None),
                    entity(Some("t.me/launch_chat"), None),
                ],
            }),
        });

        assert_eq!(harvest_urls(&user), vec!["example.org", "t.me/launch_chat"]);
    }

    #[test]
    fn metrics_tolerate_a_bare_profile() {
        let user = ApiUser {
            id: "42".to_string(),
            name: "Bare".to_string(),
            username: "bare".to_string(),
            description: None,
            created_at: None,
            public_metrics: None,
            entities: None,
        };

        let metrics = account_metrics(&user);
        assert_eq!(metrics.handle, "bare");
        assert_eq!(metrics.description, "");
        assert_eq!(metrics.follower_count, 0);
        assert!(metrics.urls.is_empty());
    }
}
