use async_trait::async_trait;
use birdwatch_core::{BotError, LlmConfig, LlmError, PromptLibrary};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const IMAGE_GENERATIONS_URL: &str = "https://api.openai.com/v1/images/generations";

/// A generated original post, optionally carrying rendered image bytes.
#[derive(Debug, Clone)]
pub struct GeneratedPost {
    pub text: String,
    pub image: Option<Vec<u8>>,
}

/// Produces reply and post text for the pipeline. Implementations may fail;
/// callers fall back to a configured static reply.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_reply(&self, tweet_text: &str) -> Result<String, BotError>;

    async fn generate_post(&self) -> Result<String, BotError>;

    /// Generates a post paired with an image when image templates are
    /// configured; degrades to a text-only post otherwise.
    async fn generate_post_with_image(&self) -> Result<GeneratedPost, BotError>;
}

pub struct OpenAiGenerator {
    http_client: reqwest::Client,
    api_key: String,
    config: LlmConfig,
    prompts: PromptLibrary,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: String,
}

impl OpenAiGenerator {
    pub fn new(config: LlmConfig, prompts: PromptLibrary) -> Result<Self, BotError> {
        let api_key = config.resolve_api_key().ok_or(LlmError::InvalidApiKey)?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            http_client,
            api_key,
            config,
            prompts,
        })
    }

    async fn chat_completion(&self, system_prompt: &str) -> Result<String, BotError> {
        let body = json!({
            "model": self.config.model,
            "messages": [{"role": "system", "content": system_prompt}],
            "temperature": self.config.temperature,
        });

        let response = self
            .http_client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimitExceeded { retry_after: 60 }.into());
        }
        if status.as_u16() == 401 {
            return Err(LlmError::InvalidApiKey.into());
        }
        if !status.is_success() {
            return Err(LlmError::ServiceUnavailable {
                status_code: status.as_u16(),
            }
            .into());
        }

        let completion: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponseFormat {
                details: e.to_string(),
            })?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                LlmError::InvalidResponseFormat {
                    details: "no choices in response".to_string(),
                }
                .into()
            })
    }

    async fn generate_image(&self, image_prompt: &str) -> Result<Vec<u8>, BotError> {
        let body = json!({
            "model": self.config.image_model,
            "prompt": image_prompt,
            "n": 1,
            "size": "1024x1024",
        });

        let response = self
            .http_client
            .post(IMAGE_GENERATIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::ServiceUnavailable {
                status_code: response.status().as_u16(),
            }
            .into());
        }

        let generated: ImageGenerationResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponseFormat {
                details: e.to_string(),
            })?;
        let url = generated
            .data
            .into_iter()
            .next()
            .map(|image| image.url)
            .ok_or(LlmError::InvalidResponseFormat {
                details: "no image in response".to_string(),
            })?;

        debug!("Downloading generated image");
        let image = self.http_client.get(&url).send().await?.bytes().await?;
        Ok(image.to_vec())
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate_reply(&self, tweet_text: &str) -> Result<String, BotError> {
        let prompt = render_reply_prompt(&self.prompts.reply_prompt, tweet_text);
        debug!("Generating reply to: {}", tweet_text);
        let content = self.chat_completion(&prompt).await?;
        let reply = extract_field(&content, "reply");
        info!("Generated reply: {}", reply);
        Ok(reply)
    }

    async fn generate_post(&self) -> Result<String, BotError> {
        let template = pick(&self.prompts.post_prompts).ok_or(LlmError::InvalidPrompt {
            reason: "no post prompt templates configured".to_string(),
        })?;
        let content = self.chat_completion(template).await?;
        Ok(extract_field(&content, "tweet"))
    }

    async fn generate_post_with_image(&self) -> Result<GeneratedPost, BotError> {
        let Some(template) = pick(&self.prompts.image_prompts) else {
            debug!("No image prompt templates configured, generating text-only post");
            let text = self.generate_post().await?;
            return Ok(GeneratedPost { text, image: None });
        };

        let content = self.chat_completion(&template.tweet_text_prompt).await?;
        let text = extract_field(&content, "tweet");
        let image = match self.generate_image(&template.image_prompt).await {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("Image generation failed, posting text only: {}", e);
                None
            }
        };
        Ok(GeneratedPost { text, image })
    }
}

fn render_reply_prompt(template: &str, tweet_text: &str) -> String {
    if template.contains("{tweet}") {
        template.replace("{tweet}", tweet_text)
    } else {
        format!("{template}\n\nTweet: {tweet_text}")
    }
}

/// Models answer with either a bare string or a small JSON object such as
/// `{"reply": "..."}`; accept both.
fn extract_field(content: &str, field: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(content) {
        if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }
    content.trim().to_string()
}

fn pick<T>(items: &[T]) -> Option<&T> {
    if items.is_empty() {
        None
    } else {
        Some(&items[fastrand::usize(..items.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_field_reads_json_object() {
        let content = r#"{"reply": "Glad you asked!"}"#;
        assert_eq!(extract_field(content, "reply"), "Glad you asked!");
    }

    #[test]
    fn extract_field_falls_back_to_raw_content() {
        assert_eq!(extract_field("  plain answer  ", "reply"), "plain answer");

        // JSON without the expected key is returned as-is.
        let content = r#"{"other": "value"}"#;
        assert_eq!(extract_field(content, "reply"), content);
    }

    #[test]
    fn reply_prompt_substitutes_placeholder() {
        let rendered = render_reply_prompt("Answer this: {tweet}", "hello there");
        assert_eq!(rendered, "Answer this: hello there");
    }

    #[test]
    fn reply_prompt_appends_when_placeholder_missing() {
        let rendered = render_reply_prompt("Answer the tweet.", "hello there");
        assert!(rendered.ends_with("Tweet: hello there"));
    }

    #[test]
    fn pick_handles_empty_slice() {
        let empty: Vec<String> = Vec::new();
        assert!(pick(&empty).is_none());

        let one = vec!["only".to_string()];
        assert_eq!(pick(&one), Some(&"only".to_string()));
    }

    #[test]
    fn generator_requires_an_api_key() {
        // Only run the negative check when the environment cannot supply one.
        if std::env::var("OPENAI_API_KEY").is_err() {
            let config = LlmConfig::default();
            assert!(OpenAiGenerator::new(config, PromptLibrary::default()).is_err());
        }
    }

    #[test]
    fn chat_completion_response_parses() {
        let raw = r#"{
            "choices": [{"message": {"role": "assistant", "content": "{\"tweet\": \"hi\"}"}}]
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let content = &response.choices[0].message.content;
        assert_eq!(extract_field(content, "tweet"), "hi");
    }
}
