use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use airtable_client::AirtableClient;
use followsignal_common::AppConfig;
use followsignal_store::{MemoryStore, PostgresStore, SnapshotStore};
use followsignal_watcher::sinks::{AirtableSink, ResultSink, TelegramSink};
use followsignal_watcher::traits::SocialGraph;
use followsignal_watcher::watcher::Watcher;
use followsignal_watcher::watchlist::AirtableDirectory;
use telegram_client::TelegramClient;
use twitter_client::TwitterClient;

#[derive(Parser)]
#[command(name = "followsignal-watcher", about = "Follow-discovery watcher and scorer")]
struct Cli {
    /// Run one sync cycle and exit instead of looping
    #[arg(long)]
    once: bool,

    /// Reconcile snapshots against the watch list, then exit
    #[arg(long)]
    seed_store: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("followsignal=info".parse()?),
        )
        .init();

    info!("FollowSignal watcher starting...");

    let cli = Cli::parse();

    // Load config
    let config = AppConfig::from_env()?;

    // Snapshot store
    let store: Arc<dyn SnapshotStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            followsignal_store::postgres::migrate(store.pool()).await?;
            info!("Connected to the Postgres snapshot store");
            Arc::new(store)
        }
        None => {
            info!("No DATABASE_URL set, using in-memory snapshots");
            Arc::new(MemoryStore::new())
        }
    };

    // Upstream graph client
    let graph: Arc<dyn SocialGraph> = Arc::new(TwitterClient::new(
        config.twitter_bearer_token.clone(),
        Duration::from_secs(config.fetch_timeout_secs),
    )?);

    // Watch list and sinks
    let airtable = Arc::new(AirtableClient::new(
        config.airtable_api_key.clone(),
        &config.airtable_base_id,
    ));
    let watchlist = Arc::new(AirtableDirectory::new(Arc::clone(&airtable), &config));

    let mut sinks: Vec<Arc<dyn ResultSink>> =
        vec![Arc::new(AirtableSink::new(Arc::clone(&airtable), &config))];
    match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            sinks.push(Arc::new(TelegramSink::new(TelegramClient::new(
                token.clone(),
                chat_id.clone(),
            ))));
        }
        _ => info!("Telegram credentials not set, notifier sink disabled"),
    }

    let watcher = Watcher::new(store, graph, watchlist, sinks, &config);

    // Bring the store in line with the watch list before any cycle runs
    watcher.reconcile().await?;
    if cli.seed_store {
        info!("Store seeded, exiting");
        return Ok(());
    }

    if cli.once {
        let stats = watcher.run_cycle().await?;
        info!("{stats}");
        return Ok(());
    }

    watcher
        .run_until_shutdown(Duration::from_secs(config.sync_interval_secs))
        .await
}
