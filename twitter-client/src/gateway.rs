use crate::api::TwitterApiClient;
use crate::auth::CredentialCoordinator;
use crate::rate_limiter::RateGovernor;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use birdwatch_core::{BotError, Friendship, Tweet};
use std::sync::Arc;

/// Platform operations available to the monitoring pipeline. Implementations
/// pace their own calls and surface failures through the classified
/// taxonomy, so callers can branch on rate-limit vs forbidden vs transient.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Id of the authenticated account.
    async fn me(&self) -> Result<String, BotError>;

    async fn mentions(&self, user_id: &str, max_results: u32) -> Result<Vec<Tweet>, BotError>;

    async fn tweet(&self, id: &str) -> Result<Tweet, BotError>;

    async fn search_recent(&self, query: &str, max_results: u32) -> Result<Vec<Tweet>, BotError>;

    /// Posts a tweet, optionally as a reply and optionally with media.
    /// Returns the created tweet id.
    async fn post(
        &self,
        text: &str,
        in_reply_to: Option<&str>,
        media_ids: &[String],
    ) -> Result<String, BotError>;

    async fn friendship(&self, source_id: &str, target_id: &str) -> Result<Friendship, BotError>;

    async fn upload_media(&self, media: Vec<u8>) -> Result<String, BotError>;
}

/// The resilient gateway: every operation fetches the current bearer token
/// from the credential coordinator, passes through the shared rate governor
/// inside the raw client, and is retried on rate-limit signals per the
/// policy. All other failures propagate unchanged.
pub struct TwitterGateway {
    api: TwitterApiClient,
    auth: Arc<CredentialCoordinator>,
    retry: RetryPolicy,
}

impl TwitterGateway {
    pub fn new(auth: Arc<CredentialCoordinator>) -> Self {
        let governor = Arc::new(RateGovernor::default());
        Self {
            api: TwitterApiClient::new(governor),
            auth,
            retry: RetryPolicy::twitter(),
        }
    }
}

#[async_trait]
impl Platform for TwitterGateway {
    async fn me(&self) -> Result<String, BotError> {
        self.retry
            .execute("get_me", || async move {
                let token = self.auth.bearer_token().await;
                self.api.get_me(&token).await
            })
            .await
    }

    async fn mentions(&self, user_id: &str, max_results: u32) -> Result<Vec<Tweet>, BotError> {
        self.retry
            .execute("get_mentions", || async move {
                let token = self.auth.bearer_token().await;
                self.api.get_mentions(&token, user_id, max_results).await
            })
            .await
    }

    async fn tweet(&self, id: &str) -> Result<Tweet, BotError> {
        self.retry
            .execute("get_tweet", || async move {
                let token = self.auth.bearer_token().await;
                self.api.get_tweet(&token, id).await
            })
            .await
    }

    async fn search_recent(&self, query: &str, max_results: u32) -> Result<Vec<Tweet>, BotError> {
        self.retry
            .execute("search_recent", || async move {
                let token = self.auth.bearer_token().await;
                self.api.search_recent(&token, query, max_results).await
            })
            .await
    }

    async fn post(
        &self,
        text: &str,
        in_reply_to: Option<&str>,
        media_ids: &[String],
    ) -> Result<String, BotError> {
        self.retry
            .execute("create_tweet", || async move {
                let token = self.auth.bearer_token().await;
                self.api
                    .create_tweet(&token, text, in_reply_to, media_ids)
                    .await
            })
            .await
    }

    async fn friendship(&self, source_id: &str, target_id: &str) -> Result<Friendship, BotError> {
        self.retry
            .execute("get_friendship", || async move {
                let token = self.auth.bearer_token().await;
                self.api.get_friendship(&token, source_id, target_id).await
            })
            .await
    }

    async fn upload_media(&self, media: Vec<u8>) -> Result<String, BotError> {
        self.retry
            .execute("upload_media", || {
                let media = media.clone();
                async move {
                    let token = self.auth.bearer_token().await;
                    self.api.upload_media(&token, media).await
                }
            })
            .await
    }
}
