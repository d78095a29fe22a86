use crate::rate_limiter::RateGovernor;
use birdwatch_core::{BotError, Friendship, Tweet, TwitterApiError};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const API_BASE: &str = "https://api.twitter.com/2";
const FRIENDSHIP_URL: &str = "https://api.twitter.com/1.1/friendships/show.json";
const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";
const USER_AGENT: &str = concat!("birdwatch/", env!("CARGO_PKG_VERSION"));

/// Fields requested with every tweet payload; the monitor needs authorship,
/// timestamps and reply references to build queue items.
const TWEET_FIELDS: &str = "author_id,created_at,conversation_id,referenced_tweets";

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct DataEnvelope<T> {
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadData {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct FriendshipEnvelope {
    relationship: Relationship,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    source: RelationshipSource,
}

#[derive(Debug, Deserialize)]
struct RelationshipSource {
    following: bool,
    followed_by: bool,
}

/// Raw HTTP client for the platform API. Every request passes through the
/// shared rate governor and has its failure status classified into the
/// `TwitterApiError` taxonomy before callers see it.
#[derive(Debug)]
pub struct TwitterApiClient {
    http_client: Client,
    governor: Arc<RateGovernor>,
}

impl TwitterApiClient {
    pub fn new(governor: Arc<RateGovernor>) -> Self {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            governor,
        }
    }

    async fn execute(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, BotError> {
        self.governor.throttle().await;
        debug!("Twitter API request: {}", endpoint);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {}: {}", endpoint, e);
                if e.is_timeout() {
                    return Err(TwitterApiError::RequestTimeout.into());
                }
                return Err(BotError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status {} for {}", status, endpoint);
        let error = match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!(
                    "Rate limited on {}, retry after {} seconds",
                    endpoint, retry_after
                );
                TwitterApiError::RateLimitExceeded { retry_after }
            }
            401 => TwitterApiError::InvalidToken,
            403 => TwitterApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            404 => TwitterApiError::NotFound {
                resource: endpoint.to_string(),
            },
            code if status.is_server_error() => TwitterApiError::ServerError { status_code: code },
            code => TwitterApiError::InvalidResponse {
                details: format!("unexpected status {code} for {endpoint}"),
            },
        };
        Err(error.into())
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        response: Response,
    ) -> Result<T, BotError> {
        response.json().await.map_err(|e| {
            error!("Failed to parse response for {}: {}", endpoint, e);
            TwitterApiError::InvalidResponse {
                details: format!("failed to parse response for {endpoint}"),
            }
            .into()
        })
    }

    pub async fn get_me(&self, access_token: &str) -> Result<String, BotError> {
        let request = self
            .http_client
            .get(format!("{API_BASE}/users/me"))
            .bearer_auth(access_token);
        let response = self.execute("/users/me", request).await?;

        let envelope: DataEnvelope<UserData> = self.parse("/users/me", response).await?;
        let user = envelope.data.ok_or(TwitterApiError::InvalidResponse {
            details: "missing user data".to_string(),
        })?;
        debug!("Authenticated user id: {}", user.id);
        Ok(user.id)
    }

    pub async fn get_mentions(
        &self,
        access_token: &str,
        user_id: &str,
        max_results: u32,
    ) -> Result<Vec<Tweet>, BotError> {
        let endpoint = format!("/users/{user_id}/mentions");
        let max_results = max_results.to_string();
        let request = self
            .http_client
            .get(format!("{API_BASE}{endpoint}"))
            .bearer_auth(access_token)
            .query(&[
                ("max_results", max_results.as_str()),
                ("tweet.fields", TWEET_FIELDS),
            ]);
        let response = self.execute(&endpoint, request).await?;

        let envelope: DataEnvelope<Vec<Tweet>> = self.parse(&endpoint, response).await?;
        let mentions = envelope.data.unwrap_or_default();
        info!("Retrieved {} mentions", mentions.len());
        Ok(mentions)
    }

    pub async fn get_tweet(&self, access_token: &str, id: &str) -> Result<Tweet, BotError> {
        let endpoint = format!("/tweets/{id}");
        let request = self
            .http_client
            .get(format!("{API_BASE}{endpoint}"))
            .bearer_auth(access_token)
            .query(&[("tweet.fields", TWEET_FIELDS)]);
        let response = self.execute(&endpoint, request).await?;

        let envelope: DataEnvelope<Tweet> = self.parse(&endpoint, response).await?;
        envelope
            .data
            .ok_or_else(|| {
                TwitterApiError::NotFound {
                    resource: endpoint.clone(),
                }
                .into()
            })
    }

    pub async fn search_recent(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<Tweet>, BotError> {
        let endpoint = "/tweets/search/recent";
        let max_results = max_results.to_string();
        let request = self
            .http_client
            .get(format!("{API_BASE}{endpoint}"))
            .bearer_auth(access_token)
            .query(&[
                ("query", query),
                ("max_results", max_results.as_str()),
                ("tweet.fields", TWEET_FIELDS),
            ]);
        let response = self.execute(endpoint, request).await?;

        let envelope: DataEnvelope<Vec<Tweet>> = self.parse(endpoint, response).await?;
        let tweets = envelope.data.unwrap_or_default();
        info!("Search returned {} tweets for query: {}", tweets.len(), query);
        Ok(tweets)
    }

    pub async fn create_tweet(
        &self,
        access_token: &str,
        text: &str,
        in_reply_to: Option<&str>,
        media_ids: &[String],
    ) -> Result<String, BotError> {
        let endpoint = "/tweets";
        let mut body = serde_json::json!({ "text": text });
        if let Some(reply_to) = in_reply_to {
            body["reply"] = serde_json::json!({ "in_reply_to_tweet_id": reply_to });
        }
        if !media_ids.is_empty() {
            body["media"] = serde_json::json!({ "media_ids": media_ids });
        }

        let request = self
            .http_client
            .post(format!("{API_BASE}{endpoint}"))
            .bearer_auth(access_token)
            .json(&body);
        let response = self.execute(endpoint, request).await?;

        let envelope: DataEnvelope<CreatedTweet> = self.parse(endpoint, response).await?;
        let created = envelope.data.ok_or(TwitterApiError::InvalidResponse {
            details: "missing created tweet data".to_string(),
        })?;
        info!("Created tweet {}", created.id);
        Ok(created.id)
    }

    pub async fn get_friendship(
        &self,
        access_token: &str,
        source_id: &str,
        target_id: &str,
    ) -> Result<Friendship, BotError> {
        let request = self
            .http_client
            .get(FRIENDSHIP_URL)
            .bearer_auth(access_token)
            .query(&[("source_id", source_id), ("target_id", target_id)]);
        let response = self.execute("/friendships/show", request).await?;

        let envelope: FriendshipEnvelope = self.parse("/friendships/show", response).await?;
        Ok(Friendship {
            following: envelope.relationship.source.following,
            followed_by: envelope.relationship.source.followed_by,
        })
    }

    pub async fn upload_media(
        &self,
        access_token: &str,
        media: Vec<u8>,
    ) -> Result<String, BotError> {
        let part = reqwest::multipart::Part::bytes(media).file_name("media.png");
        let form = reqwest::multipart::Form::new().part("media", part);
        let request = self
            .http_client
            .post(MEDIA_UPLOAD_URL)
            .bearer_auth(access_token)
            .multipart(form);
        let response = self.execute("/media/upload", request).await?;

        let upload: MediaUploadData = self.parse("/media/upload", response).await?;
        info!("Uploaded media {}", upload.media_id_string);
        Ok(upload.media_id_string)
    }
}
