use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single remote post as returned by the platform API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub referenced_tweets: Vec<TweetRef>,
}

/// Reference from one tweet to another (reply, quote, retweet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl Tweet {
    /// Id of the tweet this one replies to, if any.
    pub fn replied_to_id(&self) -> Option<&str> {
        self.referenced_tweets
            .iter()
            .find(|r| r.kind == "replied_to")
            .map(|r| r.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Friendship {
    pub following: bool,
    pub followed_by: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tweet_deserializes_from_api_payload() {
        let raw = r#"{
            "id": "1750000000000000001",
            "text": "@birdwatch how do I get started?",
            "author_id": "900000001",
            "created_at": "2024-01-20T09:30:00.000Z",
            "conversation_id": "1750000000000000000",
            "referenced_tweets": [{"type": "replied_to", "id": "1750000000000000000"}]
        }"#;

        let tweet: Tweet = serde_json::from_str(raw).unwrap();
        assert_eq!(tweet.id, "1750000000000000001");
        assert_eq!(tweet.author_id, "900000001");
        assert!(tweet.created_at.is_some());
        assert_eq!(tweet.replied_to_id(), Some("1750000000000000000"));
    }

    #[test]
    fn tweet_tolerates_missing_optional_fields() {
        let raw = r#"{"id": "1", "text": "hello", "author_id": "2"}"#;
        let tweet: Tweet = serde_json::from_str(raw).unwrap();
        assert!(tweet.created_at.is_none());
        assert!(tweet.conversation_id.is_none());
        assert!(tweet.referenced_tweets.is_empty());
        assert_eq!(tweet.replied_to_id(), None);
    }
}
