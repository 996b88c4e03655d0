//! Service-account token acquisition (client credentials) with caching.

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

use super::error::ProviderError;
use super::types::TokenResponse;
use crate::config::ProviderConfig;

const REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Cached token with expiration tracking.
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn new(token: String, valid_for: Duration) -> Self {
        Self {
            token,
            expires_at: Instant::now() + valid_for,
        }
    }

    fn is_valid(&self, margin: Duration) -> bool {
        Instant::now() + margin < self.expires_at
    }
}

/// Cache-aside bearer token for calls made on behalf of the service itself.
///
/// Reads take the shared lock; a refresh takes the exclusive lock and checks
/// again so concurrent callers trigger a single fetch.
pub struct TokenCache {
    http: Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(http: Client, config: &ProviderConfig) -> Self {
        Self {
            http,
            endpoint: config.token_endpoint(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cached: RwLock::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, ProviderError> {
        {
            let cached = self.cached.read().await;
            if let Some(cached) = cached.as_ref() {
                if cached.is_valid(REFRESH_MARGIN) {
                    trace!("using cached service token");
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        if let Some(existing) = cached.as_ref() {
            if existing.is_valid(REFRESH_MARGIN) {
                return Ok(existing.token.clone());
            }
        }

        debug!(client_id = %self.client_id, "fetching service token");
        let (token, valid_for) = self.fetch().await?;
        *cached = Some(CachedToken::new(token.clone(), valid_for));
        Ok(token)
    }

    /// Drop the cached token, e.g. after the provider answered 401.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn fetch(&self) -> Result<(String, Duration), ProviderError> {
        let response = self
            .http
            .post(&self.endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("service token request timed out");
                    return ProviderError::Timeout;
                }
                error!(error = %e, "network error fetching service token");
                ProviderError::Network(e)
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::BAD_REQUEST {
            return Err(ProviderError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(status.as_u16(), body));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("token response: {e}")))?;

        Ok((body.access_token, Duration::from_secs(body.expires_in)))
    }
}
