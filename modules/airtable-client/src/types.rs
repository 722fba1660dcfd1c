use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored record: the Airtable record id plus the typed field set.
#[derive(Debug, Clone, Deserialize)]
pub struct Record<T> {
    pub id: String,
    #[serde(rename = "createdTime")]
    pub created_time: Option<DateTime<Utc>>,
    pub fields: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub records: Vec<Record<T>>,
    pub offset: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRequest<'a, T> {
    pub records: Vec<CreateRecord<'a, T>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRecord<'a, T> {
    pub fields: &'a T,
}

// --- Table schemas ---
//
// Airtable omits a field entirely when the cell is blank, so every read-side
// field is optional. Column names are fixed by the existing base.

/// Row in the tracked-users table: one watch-list handle and the bonus it
/// confers on discoveries it produces.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackedUserFields {
    #[serde(rename = "Tracked Users")]
    pub handle: Option<String>,
    #[serde(rename = "Points")]
    pub points: Option<i64>,
}

/// Row in the keywords table: one weighted phrase.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordFields {
    #[serde(rename = "Keywords")]
    pub phrase: Option<String>,
    #[serde(rename = "Points")]
    pub points: Option<i64>,
}

/// Row written to the results table for every discovery. `follower_points`
/// is the tracked-account bonus; the column name predates this codebase.
#[derive(Debug, Clone, Serialize)]
pub struct ResultFields {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Following Date")]
    pub following_date: String,
    #[serde(rename = "Account URL")]
    pub account_url: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Description Points")]
    pub description_points: i64,
    #[serde(rename = "Followed By")]
    pub followed_by: String,
    #[serde(rename = "Follower Points")]
    pub follower_points: i64,
    #[serde(rename = "Creation Date", skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(rename = "Creation Date Points")]
    pub creation_date_points: i64,
    #[serde(rename = "Followers Count")]
    pub followers_count: i64,
    #[serde(rename = "Followers Count Points")]
    pub followers_count_points: i64,
    #[serde(rename = "Links")]
    pub links: String,
    #[serde(rename = "Links Points")]
    pub links_points: i64,
    #[serde(rename = "Score")]
    pub score: i64,
}

/// Row written to the leaderboard table for discoveries above the threshold.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardFields {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Score")]
    pub score: i64,
    #[serde(rename = "Creation Date", skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(rename = "Account URL")]
    pub account_url: String,
    #[serde(rename = "Links")]
    pub links: String,
}

/// Read-side view of the leaderboard, just enough for membership checks.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardRow {
    #[serde(rename = "Username")]
    pub username: Option<String>,
}
