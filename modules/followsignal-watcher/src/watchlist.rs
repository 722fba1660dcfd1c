//! The operator-maintained watch list and scoring tables.

use std::sync::Arc;

use airtable_client::{AirtableClient, KeywordFields, TrackedUserFields};
use anyhow::{Context, Result};
use async_trait::async_trait;
use followsignal_common::{AccountWeight, AppConfig, KeywordWeight};

/// Where the watch list and keyword table come from. Read fresh every
/// cycle so operator edits take effect without a restart.
#[async_trait]
pub trait WatchlistSource: Send + Sync {
    /// Every tracked handle with its source bonus.
    async fn tracked_accounts(&self) -> Result<Vec<AccountWeight>>;

    /// Every weighted keyword phrase.
    async fn keywords(&self) -> Result<Vec<KeywordWeight>>;
}

/// Watch list backed by the operator's Airtable base. Rows with a blank
/// key cell are skipped; a blank points cell means zero.
pub struct AirtableDirectory {
    client: Arc<AirtableClient>,
    tracked_table: String,
    keywords_table: String,
}

impl AirtableDirectory {
    pub fn new(client: Arc<AirtableClient>, config: &AppConfig) -> Self {
        Self {
            client,
            tracked_table: config.airtable_tracked_table.clone(),
            keywords_table: config.airtable_keywords_table.clone(),
        }
    }
}

#[async_trait]
impl WatchlistSource for AirtableDirectory {
    async fn tracked_accounts(&self) -> Result<Vec<AccountWeight>> {
        let records = self
            .client
            .list_all::<TrackedUserFields>(&self.tracked_table)
            .await
            .context("Failed to list the tracked-accounts table")?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let handle = record.fields.handle?.trim().to_string();
                if handle.is_empty() {
                    return None;
                }
                Some(AccountWeight {
                    handle,
                    points: record.fields.points.unwrap_or(0),
                })
            })
            .collect())
    }

    async fn keywords(&self) -> Result<Vec<KeywordWeight>> {
        let records = self
            .client
            .list_all::<KeywordFields>(&self.keywords_table)
            .await
            .context("Failed to list the keywords table")?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let phrase = record.fields.phrase?.trim().to_string();
                if phrase.is_empty() {
                    return None;
                }
                Some(KeywordWeight {
                    phrase,
                    points: record.fields.points.unwrap_or(0),
                })
            })
            .collect())
    }
}
