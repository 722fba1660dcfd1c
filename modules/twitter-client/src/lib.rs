pub mod error;
pub mod types;

pub use error::{Result, TwitterError};
pub use types::{ApiTweet, ApiUser, FollowingPage, SearchPage};

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::RwLock;
use types::{SearchResponse, UsersResponse};

const BASE_URL: &str = "https://api.twitter.com/2";

/// Endpoint maximum page size for the following list.
pub const FOLLOWING_PAGE_SIZE: u32 = 999;

/// Batch size for user lookups, kept well under the endpoint maximum.
pub const USER_LOOKUP_LIMIT: usize = 50;

/// Endpoint maximum page size for recent search.
pub const SEARCH_PAGE_SIZE: u32 = 100;

/// Profile fields needed by the scorer.
const METRIC_USER_FIELDS: &str = "description,public_metrics,created_at,entities";

pub struct TwitterClient {
    client: RwLock<reqwest::Client>,
    bearer_token: String,
    timeout: Duration,
}

impl TwitterClient {
    pub fn new(bearer_token: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: RwLock::new(build_http_client(timeout)?),
            bearer_token,
            timeout,
        })
    }

    /// Replace the underlying HTTP session, keeping the same credentials.
    /// Called after a rate-limit cooldown so the next attempt starts on
    /// fresh connections.
    pub async fn rebuild_session(&self) -> Result<()> {
        let fresh = build_http_client(self.timeout)?;
        *self.client.write().await = fresh;
        Ok(())
    }

    async fn http(&self) -> reqwest::Client {
        self.client.read().await.clone()
    }

    /// Fetch one page of the accounts `user_id` follows. Identity fields
    /// only; profile metadata comes from [`Self::get_user_metrics`].
    pub async fn get_following_page(
        &self,
        user_id: i64,
        pagination_token: Option<&str>,
    ) -> Result<FollowingPage> {
        let url = format!("{}/users/{}/following", BASE_URL, user_id);
        let mut query: Vec<(&str, String)> = vec![("max_results", FOLLOWING_PAGE_SIZE.to_string())];
        if let Some(token) = pagination_token {
            query.push(("pagination_token", token.to_string()));
        }

        let resp = self
            .http()
            .await
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&query)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let body: UsersResponse = resp.json().await?;
        let next_token = body.meta.and_then(|m| m.next_token);
        tracing::debug!(
            user_id,
            count = body.data.len(),
            has_next = next_token.is_some(),
            "Fetched following page"
        );

        Ok(FollowingPage {
            users: body.data,
            next_token,
        })
    }

    /// Resolve up to [`USER_LOOKUP_LIMIT`] handles to identity triples.
    /// Handles the API does not know are silently absent from the result.
    pub async fn get_users_by_handles(&self, handles: &[String]) -> Result<Vec<ApiUser>> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/users/by", BASE_URL);
        let resp = self
            .http()
            .await
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[("usernames", handles.join(","))])
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let body: UsersResponse = resp.json().await?;
        tracing::debug!(
            requested = handles.len(),
            resolved = body.data.len(),
            "Resolved handles"
        );
        Ok(body.data)
    }

    /// Batch profile lookup with the scoring fields attached (bio, public
    /// metrics, creation time, link entities).
    pub async fn get_user_metrics(&self, handles: &[String]) -> Result<Vec<ApiUser>> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/users/by", BASE_URL);
        let resp = self
            .http()
            .await
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("usernames", handles.join(",")),
                ("user.fields", METRIC_USER_FIELDS.to_string()),
            ])
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let body: UsersResponse = resp.json().await?;
        tracing::debug!(
            requested = handles.len(),
            resolved = body.data.len(),
            "Fetched user metrics"
        );
        Ok(body.data)
    }

    /// One page of recent-search results, with author and mention user
    /// objects expanded and flattened into the page.
    pub async fn search_recent(
        &self,
        search_query: &str,
        start_time: DateTime<Utc>,
        next_token: Option<&str>,
    ) -> Result<SearchPage> {
        let url = format!("{}/tweets/search/recent", BASE_URL);
        let mut query: Vec<(&str, String)> = vec![
            ("query", search_query.to_string()),
            ("max_results", SEARCH_PAGE_SIZE.to_string()),
            (
                "start_time",
                start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("expansions", "author_id,entities.mentions.username".to_string()),
            ("user.fields", METRIC_USER_FIELDS.to_string()),
        ];
        if let Some(token) = next_token {
            query.push(("next_token", token.to_string()));
        }

        let resp = self
            .http()
            .await
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&query)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let body: SearchResponse = resp.json().await?;
        let users = body.includes.map(|i| i.users).unwrap_or_default();
        let next_token = body.meta.and_then(|m| m.next_token);
        tracing::debug!(
            tweets = body.data.len(),
            users = users.len(),
            has_next = next_token.is_some(),
            "Fetched search page"
        );

        Ok(SearchPage {
            tweets: body.data,
            users,
            next_token,
        })
    }
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Map non-success statuses to the error taxonomy. 429 must stay
/// distinguishable from auth failures: the caller cools down on one and
/// aborts on the other.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status().as_u16();
    if status == 429 {
        return Err(TwitterError::RateLimited);
    }
    if status == 401 || status == 403 {
        let message = resp.text().await.unwrap_or_default();
        return Err(TwitterError::Unauthorized { status, message });
    }
    if !resp.status().is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(TwitterError::Api { status, message });
    }
    Ok(resp)
}
