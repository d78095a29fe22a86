use birdwatch_core::{BotError, ConfigError, TwitterApiError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

const TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";

/// Refresh when the token expires within this window.
const REFRESH_WINDOW_SECS: i64 = 300;
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 7200;

/// Credential snapshot. Replaced wholesale on every refresh; components only
/// ever hold read-only copies handed out by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub bearer_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// True when no expiry is on record or the token expires within five
    /// minutes.
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Utc::now().timestamp() <= REFRESH_WINDOW_SECS,
            None => true,
        }
    }
}

/// Durable storage for the credential snapshot.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Credentials, BotError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|_| ConfigError::FileNotFound {
            path: self.path.display().to_string(),
        })?;
        let credentials = serde_json::from_str(&raw)?;
        debug!("Loaded credentials from {}", self.path.display());
        Ok(credentials)
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), BotError> {
        let raw = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, raw)?;
        debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Owns the current credential snapshot and the refresh exchange. Producers
/// and the worker call `ensure_fresh` at the start of each cycle; a
/// dedicated background loop does the same on a fixed interval.
#[derive(Debug)]
pub struct CredentialCoordinator {
    store: CredentialStore,
    http_client: reqwest::Client,
    current: RwLock<Credentials>,
}

impl CredentialCoordinator {
    /// Loads the snapshot from the store. Missing credentials are a startup
    /// error; the system cannot run unauthenticated.
    pub fn new(store: CredentialStore) -> Result<Self, BotError> {
        let current = store.load()?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            store,
            http_client,
            current: RwLock::new(current),
        })
    }

    pub async fn snapshot(&self) -> Credentials {
        self.current.read().await.clone()
    }

    pub async fn bearer_token(&self) -> String {
        self.current.read().await.bearer_token.clone()
    }

    pub async fn needs_refresh(&self) -> bool {
        self.current.read().await.needs_refresh()
    }

    /// Exchanges the refresh token for a new bearer token, persists the new
    /// snapshot and swaps it in. Readers holding the previous snapshot are
    /// unaffected.
    pub async fn refresh(&self) -> Result<(), BotError> {
        let old = self.snapshot().await;
        info!("Refreshing platform bearer token");

        let response = self
            .http_client
            .post(TOKEN_URL)
            .basic_auth(&old.client_id, Some(&old.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", old.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Token refresh failed with status {}", status);
            return Err(TwitterApiError::AuthenticationFailed {
                reason: format!("token refresh returned status {status}"),
            }
            .into());
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            TwitterApiError::InvalidResponse {
                details: format!("token response: {e}"),
            }
        })?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let refreshed = Credentials {
            bearer_token: token.access_token,
            refresh_token: token.refresh_token.unwrap_or(old.refresh_token),
            expires_at: Some(Utc::now().timestamp() + expires_in as i64),
            client_id: old.client_id,
            client_secret: old.client_secret,
        };

        self.store.save(&refreshed)?;
        *self.current.write().await = refreshed;
        info!("Bearer token refreshed, valid for {} seconds", expires_in);
        Ok(())
    }

    /// Idempotent check-and-refresh. Returns true when a refresh happened.
    pub async fn ensure_fresh(&self) -> Result<bool, BotError> {
        if self.needs_refresh().await {
            self.refresh().await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(expires_at: Option<i64>) -> Credentials {
        Credentials {
            bearer_token: "bearer".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    #[test]
    fn missing_expiry_needs_refresh() {
        assert!(credentials(None).needs_refresh());
    }

    #[test]
    fn expiry_within_window_needs_refresh() {
        let soon = Utc::now().timestamp() + 120;
        assert!(credentials(Some(soon)).needs_refresh());

        let already_expired = Utc::now().timestamp() - 60;
        assert!(credentials(Some(already_expired)).needs_refresh());
    }

    #[test]
    fn distant_expiry_does_not_need_refresh() {
        let later = Utc::now().timestamp() + 3600;
        assert!(!credentials(Some(later)).needs_refresh());
    }

    #[test]
    fn store_roundtrips_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));

        let saved = credentials(Some(1_900_000_000));
        store.save(&saved).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.bearer_token, saved.bearer_token);
        assert_eq!(loaded.refresh_token, saved.refresh_token);
        assert_eq!(loaded.expires_at, saved.expires_at);
        assert_eq!(loaded.client_id, saved.client_id);
    }

    #[test]
    fn missing_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nope.json"));
        assert!(matches!(
            store.load(),
            Err(BotError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn coordinator_exposes_loaded_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        store.save(&credentials(Some(1_900_000_000))).unwrap();

        let coordinator = CredentialCoordinator::new(store).unwrap();
        assert_eq!(coordinator.bearer_token().await, "bearer");
        assert!(!coordinator.needs_refresh().await);
    }
}
