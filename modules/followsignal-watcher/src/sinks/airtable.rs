//! Tabular sink: every discovery lands in the results table, and the ones
//! clearing the score threshold are promoted to the leaderboard.

use std::collections::HashSet;
use std::sync::Arc;

use airtable_client::{AirtableClient, LeaderboardFields, LeaderboardRow, ResultFields};
use anyhow::{Context, Result};
use async_trait::async_trait;
use followsignal_common::{AppConfig, DiscoveryRecord};
use tracing::{debug, info};

use super::ResultSink;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct AirtableSink {
    client: Arc<AirtableClient>,
    results_table: String,
    leaderboard_table: String,
    score_threshold: i64,
}

impl AirtableSink {
    pub fn new(client: Arc<AirtableClient>, config: &AppConfig) -> Self {
        Self {
            client,
            results_table: config.airtable_results_table.clone(),
            leaderboard_table: config.airtable_leaderboard_table.clone(),
            score_threshold: config.score_threshold,
        }
    }

    /// Current leaderboard membership, read from the table itself so a
    /// restart cannot promote the same account twice.
    async fn leaderboard_members(&self) -> Result<HashSet<String>> {
        let rows = self
            .client
            .list_all::<LeaderboardRow>(&self.leaderboard_table)
            .await
            .context("Failed to read leaderboard membership")?;
        Ok(rows.into_iter().filter_map(|r| r.fields.username).collect())
    }
}

#[async_trait]
impl ResultSink for AirtableSink {
    fn name(&self) -> &'static str {
        "airtable"
    }

    async fn publish(&self, records: &[DiscoveryRecord]) -> Result<()> {
        let rows: Vec<ResultFields> = records.iter().map(result_fields).collect();
        let created = self
            .client
            .create_all(&self.results_table, &rows)
            .await
            .context("Failed to append discovery rows")?;
        debug!(created, "Appended discovery rows");

        let existing = self.leaderboard_members().await?;
        let qualified = qualify(records, &existing, self.score_threshold);
        if qualified.is_empty() {
            return Ok(());
        }

        let rows: Vec<LeaderboardFields> =
            qualified.iter().map(|r| leaderboard_fields(r)).collect();
        let created = self
            .client
            .create_all(&self.leaderboard_table, &rows)
            .await
            .context("Failed to append leaderboard rows")?;
        info!(created, "Promoted discoveries to the leaderboard");

        Ok(())
    }
}

/// Pick the records that earn a leaderboard row: not already on the board,
/// first mention in this batch, and at or above the threshold. A handle's
/// first mention claims its batch slot even when the score falls short, so
/// a weaker duplicate can never slip in behind a rejected one.
pub(crate) fn qualify<'a>(
    records: &'a [DiscoveryRecord],
    existing: &HashSet<String>,
    threshold: i64,
) -> Vec<&'a DiscoveryRecord> {
    let mut seen = HashSet::new();
    let mut qualified = Vec::new();

    for record in records {
        if existing.contains(&record.followed_handle) {
            continue;
        }
        if !seen.insert(record.followed_handle.clone()) {
            continue;
        }
        if record.total_score < threshold {
            continue;
        }
        qualified.push(record);
    }

    qualified
}

fn profile_url(handle: &str) -> String {
    format!("https://twitter.com/{handle}")
}

fn result_fields(record: &DiscoveryRecord) -> ResultFields {
    ResultFields {
        username: record.followed_handle.clone(),
        following_date: record.followed_at.format(DATE_FORMAT).to_string(),
        account_url: profile_url(&record.followed_handle),
        description: record.description.clone(),
        description_points: record.description_points,
        followed_by: record.tracked_handle.clone(),
        follower_points: record.tracked_points,
        creation_date: record.created_at.map(|d| d.format(DATE_FORMAT).to_string()),
        creation_date_points: record.created_at_points,
        followers_count: record.follower_count,
        followers_count_points: record.follower_points,
        links: record.urls.join("\n"),
        links_points: record.url_points,
        score: record.total_score,
    }
}

fn leaderboard_fields(record: &DiscoveryRecord) -> LeaderboardFields {
    LeaderboardFields {
        username: record.followed_handle.clone(),
        description: record.description.clone(),
        score: record.total_score,
        creation_date: record.created_at.map(|d| d.format(DATE_FORMAT).to_string()),
        account_url: profile_url(&record.followed_handle),
        links: record.urls.join("\n"),
    }
}
