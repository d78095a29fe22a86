use crate::error::{BotError, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration document. A single JSON file carries monitoring
/// queries, posting cadence, LLM settings, the prompt library and storage
/// paths; every section falls back to defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_seen_tweets_path")]
    pub seen_tweets_path: PathBuf,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub posting: PostingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompts: PromptLibrary,
}

impl BotConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BotError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let config = serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidFormat {
            details: e.to_string(),
        })?;
        Ok(config)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            seen_tweets_path: default_seen_tweets_path(),
            monitoring: MonitoringConfig::default(),
            posting: PostingConfig::default(),
            llm: LlmConfig::default(),
            prompts: PromptLibrary::default(),
        }
    }
}

/// What the poll producers watch for and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u64,
    #[serde(default = "default_reply_delay")]
    pub reply_delay_minutes: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            hashtags: Vec::new(),
            keywords: BTreeMap::new(),
            check_interval_minutes: default_check_interval(),
            reply_delay_minutes: default_reply_delay(),
        }
    }
}

/// Cadence of scheduled original posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_post_interval")]
    pub interval_hours: u64,
    #[serde(default = "default_image_probability")]
    pub image_probability: f64,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: default_post_interval(),
            image_probability: default_image_probability(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Falls back to the OPENAI_API_KEY environment variable when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl LlmConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            image_model: default_image_model(),
            temperature: default_temperature(),
        }
    }
}

/// Prompt templates for the content generator. The reply template may use a
/// `{tweet}` placeholder for the tweet being answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptLibrary {
    #[serde(default = "default_reply_prompt")]
    pub reply_prompt: String,
    #[serde(default = "default_post_prompts")]
    pub post_prompts: Vec<String>,
    #[serde(default)]
    pub image_prompts: Vec<ImagePrompt>,
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self {
            reply_prompt: default_reply_prompt(),
            post_prompts: default_post_prompts(),
            image_prompts: Vec::new(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

/// Paired prompts for a post that ships with a generated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePrompt {
    pub tweet_text_prompt: String,
    pub image_prompt: String,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_seen_tweets_path() -> PathBuf {
    PathBuf::from("seen_tweets.json")
}

fn default_check_interval() -> u64 {
    30
}

fn default_reply_delay() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_post_interval() -> u64 {
    8
}

fn default_image_probability() -> f64 {
    0.7
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_temperature() -> f64 {
    0.4
}

fn default_reply_prompt() -> String {
    "You run a friendly social media account. Write a short, helpful reply \
     to the tweet below. Respond as JSON: {\"reply\": \"...\"}.\n\nTweet: {tweet}"
        .to_string()
}

fn default_post_prompts() -> Vec<String> {
    vec![
        "You run a friendly social media account. Write one short, engaging \
         tweet for a general audience. Respond as JSON: {\"tweet\": \"...\"}."
            .to_string(),
    ]
}

fn default_fallback_reply() -> String {
    "Thanks for reaching out! We'll get back to you soon.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_takes_defaults() {
        let config: BotConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.monitoring.check_interval_minutes, 30);
        assert_eq!(config.monitoring.reply_delay_minutes, 60);
        assert_eq!(config.posting.interval_hours, 8);
        assert!(config.posting.enabled);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.prompts.reply_prompt.contains("{tweet}"));
        assert_eq!(config.credentials_path, PathBuf::from("credentials.json"));
    }

    #[test]
    fn monitoring_section_parses() {
        let raw = r##"{
            "monitoring": {
                "hashtags": ["#rustlang", "#opensource"],
                "keywords": {
                    "tooling": ["cargo", "clippy"],
                    "async": ["tokio", "futures"]
                },
                "check_interval_minutes": 10,
                "reply_delay_minutes": 5
            }
        }"##;
        let config: BotConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.monitoring.hashtags.len(), 2);
        assert_eq!(config.monitoring.keywords["tooling"], vec!["cargo", "clippy"]);
        assert_eq!(config.monitoring.check_interval_minutes, 10);
        assert_eq!(config.monitoring.reply_delay_minutes, 5);
    }

    #[test]
    fn load_reports_missing_file() {
        let result = BotConfig::load("does-not-exist.json");
        assert!(matches!(
            result,
            Err(BotError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
