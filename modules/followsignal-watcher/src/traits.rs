use async_trait::async_trait;
use chrono::{DateTime, Utc};
use twitter_client::{ApiUser, FollowingPage, SearchPage, TwitterClient};

/// Read side of the upstream social graph, plus session control.
///
/// The watcher depends on this instead of the concrete client so cycle
/// logic can run against a scripted graph in tests.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// One page of the accounts `user_id` follows.
    async fn following_page(
        &self,
        user_id: i64,
        pagination_token: Option<&str>,
    ) -> twitter_client::Result<FollowingPage>;

    /// Resolve handles to identity fields. Unknown handles are absent from
    /// the result, not errors.
    async fn users_by_handles(&self, handles: &[String]) -> twitter_client::Result<Vec<ApiUser>>;

    /// Profile lookup with the scoring fields attached.
    async fn user_metrics(&self, handles: &[String]) -> twitter_client::Result<Vec<ApiUser>>;

    /// One page of recent-search results.
    async fn search_recent(
        &self,
        query: &str,
        start_time: DateTime<Utc>,
        next_token: Option<&str>,
    ) -> twitter_client::Result<SearchPage>;

    /// Tear down and rebuild the transport session. Called after a
    /// rate-limit cooldown so the next attempt starts clean.
    async fn reset_session(&self) -> twitter_client::Result<()>;
}

#[async_trait]
impl SocialGraph for TwitterClient {
    async fn following_page(
        &self,
        user_id: i64,
        pagination_token: Option<&str>,
    ) -> twitter_client::Result<FollowingPage> {
        self.get_following_page(user_id, pagination_token).await
    }

    async fn users_by_handles(&self, handles: &[String]) -> twitter_client::Result<Vec<ApiUser>> {
        self.get_users_by_handles(handles).await
    }

    async fn user_metrics(&self, handles: &[String]) -> twitter_client::Result<Vec<ApiUser>> {
        self.get_user_metrics(handles).await
    }

    async fn search_recent(
        &self,
        query: &str,
        start_time: DateTime<Utc>,
        next_token: Option<&str>,
    ) -> twitter_client::Result<SearchPage> {
        TwitterClient::search_recent(self, query, start_time, next_token).await
    }

    async fn reset_session(&self) -> twitter_client::Result<()> {
        self.rebuild_session().await
    }
}
