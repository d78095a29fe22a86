use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Twitter API error: {0}")]
    Twitter(#[from] TwitterApiError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BotError {
    /// True when the remote API throttled us; loops branch on this to pick
    /// their cooldown.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            BotError::Twitter(TwitterApiError::RateLimitExceeded { .. })
        )
    }

    /// True when the target permanently restricts the attempted action.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, BotError::Twitter(TwitterApiError::Forbidden { .. }))
    }
}

#[derive(Error, Debug, Clone)]
pub enum TwitterApiError {
    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API key invalid or missing")]
    InvalidApiKey,

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Provider service unavailable: {status_code}")]
    ServiceUnavailable { status_code: u16 },

    #[error("Invalid prompt: {reason}")]
    InvalidPrompt { reason: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid response format: {details}")]
    InvalidResponseFormat { details: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {details}")]
    InvalidFormat { details: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}
