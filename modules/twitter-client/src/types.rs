use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A user object from the v2 API. Profile fields beyond the identity triple
/// are present only when the request asked for them via `user.fields`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    /// Numeric id serialized as a string on the wire.
    pub id: String,
    pub name: String,
    pub username: String,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub public_metrics: Option<PublicMetrics>,
    pub entities: Option<UserEntities>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PublicMetrics {
    pub followers_count: i64,
    pub following_count: i64,
    pub tweet_count: i64,
}

/// Link entities extracted from the profile url and bio.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntities {
    pub url: Option<EntityUrls>,
    pub description: Option<EntityUrls>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityUrls {
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlEntity {
    pub url: Option<String>,
    /// The unshortened target; prefer this over the wrapped `url`.
    pub expanded_url: Option<String>,
    pub display_url: Option<String>,
}

impl UrlEntity {
    /// Best available form of the link.
    pub fn resolved(&self) -> Option<&str> {
        self.expanded_url.as_deref().or(self.url.as_deref())
    }
}

/// A tweet from the recent-search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiTweet {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
}

/// Pagination metadata shared by the v2 list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub result_count: Option<u64>,
    pub next_token: Option<String>,
}

/// Envelope for endpoints returning a list of users. `data` is omitted
/// entirely when the page is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub data: Vec<ApiUser>,
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchIncludes {
    #[serde(default)]
    pub users: Vec<ApiUser>,
}

/// Envelope for the recent-search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<ApiTweet>,
    pub includes: Option<SearchIncludes>,
    pub meta: Option<PageMeta>,
}

/// One page of a following list plus the token for the next one.
#[derive(Debug, Clone)]
pub struct FollowingPage {
    pub users: Vec<ApiUser>,
    pub next_token: Option<String>,
}

/// One page of recent-search results with expansion users flattened in.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub tweets: Vec<ApiTweet>,
    pub users: Vec<ApiUser>,
    pub next_token: Option<String>,
}
