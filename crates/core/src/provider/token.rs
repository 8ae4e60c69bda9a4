//! Provider auth token handling.
//!
//! The token is held behind an injected provider rather than as process-wide
//! mutable state, and is refreshed with a safety margin before expiry.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ProviderConfig;

use super::ProviderError;

#[derive(Debug, Clone)]
struct TokenState {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Caching token provider for the upstream pricing API.
pub struct TokenProvider {
    client: Client,
    config: ProviderConfig,
    state: Mutex<Option<TokenState>>,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    /// Token lifetime in seconds.
    #[serde(rename = "expiresIn")]
    expires_in: i64,
}

impl TokenProvider {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        Self {
            client,
            config,
            state: Mutex::new(None),
        }
    }

    /// Returns a valid token, logging in again when the cached one is
    /// expired or within the configured safety margin of expiring.
    pub async fn token(&self) -> Result<String, ProviderError> {
        let mut state = self.state.lock().await;

        let margin = Duration::seconds(self.config.token_safety_margin_secs as i64);
        if let Some(ref cached) = *state {
            if cached.expires_at - margin > Utc::now() {
                return Ok(cached.token.clone());
            }
            debug!("Provider token near expiry, refreshing");
        }

        let fresh = self.login().await?;
        let token = fresh.token.clone();
        *state = Some(fresh);
        Ok(token)
    }

    /// Drops the cached token so the next call logs in again.
    /// Called after an upstream 401 on an authenticated request.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        *state = None;
    }

    async fn login(&self) -> Result<TokenState, ProviderError> {
        let url = format!("{}/auth/login", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Auth("invalid provider credentials".to_string()));
        }
        if !response.status().is_success() {
            return Err(ProviderError::Http(format!(
                "login returned {}",
                response.status()
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(TokenState {
            token: login.token,
            expires_at: Utc::now() + Duration::seconds(login.expires_in),
        })
    }
}
