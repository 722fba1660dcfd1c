use thiserror::Error;

/// Failure taxonomy for the sync path.
///
/// `Auth` is the only fatal class: credentials do not heal on retry, so the
/// process stops loudly instead of burning the rate-limit budget. Everything
/// else is scoped to one account or one cycle.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("rate limit budget exhausted after {waits} cooldown waits")]
    RateLimitBudget { waits: u32 },

    #[error("upstream rejected credentials: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream API error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl WatchError {
    /// True for failures that must stop the run instead of skipping the
    /// account.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WatchError::Auth(_))
    }
}
