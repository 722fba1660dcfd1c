//! Notifier sink: one line per discovery into the operator chat.

use async_trait::async_trait;
use followsignal_common::DiscoveryRecord;
use telegram_client::TelegramClient;
use tracing::debug;

use super::ResultSink;

/// Truncation kicks in above this length, keeping the message plus its
/// ellipsis under [`telegram_client::MESSAGE_CAP`].
const TRUNCATE_THRESHOLD: usize = 4087;
const TRUNCATE_KEEP: usize = 4090;

pub struct TelegramSink {
    client: TelegramClient,
}

impl TelegramSink {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResultSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn publish(&self, records: &[DiscoveryRecord]) -> anyhow::Result<()> {
        let message = format_message(records);
        self.client.send_message(&message).await?;
        debug!(lines = records.len(), "Sent discovery notification");
        Ok(())
    }
}

/// One line per discovery, oldest first. An overlong batch is truncated
/// with an ellipsis rather than split across messages.
pub(crate) fn format_message(records: &[DiscoveryRecord]) -> String {
    let lines: Vec<String> = records
        .iter()
        .map(|record| {
            format!(
                "@{} start following @{} on {}",
                record.tracked_handle,
                record.followed_handle,
                record.followed_at.format("%m/%d/%Y")
            )
        })
        .collect();
    let message = lines.join("\n");

    if message.chars().count() > TRUNCATE_THRESHOLD {
        let head: String = message.chars().take(TRUNCATE_KEEP).collect();
        format!("{head}...")
    } else {
        message
    }
}
