//! Delivery targets for scored discoveries.

pub mod airtable;
pub mod telegram;

pub use airtable::AirtableSink;
pub use telegram::TelegramSink;

use async_trait::async_trait;
use followsignal_common::DiscoveryRecord;

/// One delivery target. Sinks are independent: a failing sink is logged
/// and skipped and never blocks the others or the snapshot write.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    /// Deliver one cycle's records. Called only with a non-empty batch.
    async fn publish(&self, records: &[DiscoveryRecord]) -> anyhow::Result<()>;
}
