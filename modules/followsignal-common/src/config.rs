use anyhow::Result;

/// Application configuration loaded from environment variables.
/// Secrets and env-specific knobs only; scoring tables and the watch list
/// come from the watch-list source at runtime.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Upstream graph API
    pub twitter_bearer_token: String,

    // Watch-list source / tabular sink
    pub airtable_api_key: String,
    pub airtable_base_id: String,
    pub airtable_tracked_table: String,
    pub airtable_keywords_table: String,
    pub airtable_results_table: String,
    pub airtable_leaderboard_table: String,

    // Notifier sink (absent = sink disabled)
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Snapshot store (absent = in-memory store, dev runs only)
    pub database_url: Option<String>,

    // Sync loop
    pub sync_interval_secs: u64,
    pub sync_batch_size: usize,
    pub score_threshold: i64,

    // Fetch behavior
    pub rate_limit_cooldown_secs: u64,
    pub max_rate_limit_waits: u32,
    pub fetch_timeout_secs: u64,

    // Secondary discovery
    pub sweep_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            twitter_bearer_token: std::env::var("TWITTER_BEARER_TOKEN")?,
            airtable_api_key: std::env::var("AIRTABLE_API_KEY")?,
            airtable_base_id: std::env::var("AIRTABLE_BASE_ID")?,
            airtable_tracked_table: std::env::var("AIRTABLE_TRACKED_TABLE")
                .unwrap_or_else(|_| "Tracked Users".to_string()),
            airtable_keywords_table: std::env::var("AIRTABLE_KEYWORDS_TABLE")
                .unwrap_or_else(|_| "Keywords".to_string()),
            airtable_results_table: std::env::var("AIRTABLE_RESULTS_TABLE")
                .unwrap_or_else(|_| "New Followings".to_string()),
            airtable_leaderboard_table: std::env::var("AIRTABLE_LEADERBOARD_TABLE")
                .unwrap_or_else(|_| "Leaderboard".to_string()),
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID").ok(),
            database_url: std::env::var("DATABASE_URL").ok(),
            sync_interval_secs: std::env::var("SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .unwrap_or(1800),
            sync_batch_size: std::env::var("SYNC_BATCH_SIZE")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            score_threshold: std::env::var("SCORE_THRESHOLD")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
            rate_limit_cooldown_secs: std::env::var("RATE_LIMIT_COOLDOWN_SECS")
                .unwrap_or_else(|_| "1200".to_string())
                .parse()
                .unwrap_or(1200),
            max_rate_limit_waits: std::env::var("MAX_RATE_LIMIT_WAITS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            sweep_enabled: std::env::var("SEARCH_SWEEP_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(5);
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  TWITTER_BEARER_TOKEN: {}", preview(&self.twitter_bearer_token));
        tracing::info!("  AIRTABLE_API_KEY: {}", preview(&self.airtable_api_key));
        tracing::info!("  AIRTABLE_BASE_ID: {}", preview(&self.airtable_base_id));
        tracing::info!("  TELEGRAM_BOT_TOKEN: {}", preview_opt(&self.telegram_bot_token));
        tracing::info!("  DATABASE_URL: {}", preview_opt(&self.database_url));
        tracing::info!(
            "  sync: every {}s, batch {}, threshold {}",
            self.sync_interval_secs,
            self.sync_batch_size,
            self.score_threshold
        );
    }
}
