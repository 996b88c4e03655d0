//! Error types for the authorization provider clients.

use thiserror::Error;

/// Errors that can occur when talking to the authorization provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level error during HTTP communication.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// The provider rejected the service account credentials.
    #[error("unauthorized or invalid client credentials")]
    Unauthorized,

    /// The provider rejected the caller's access token on a decision request.
    #[error("caller's access token was rejected")]
    TokenRejected,

    /// The provider returned an error status.
    #[error("provider API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Invalid or unparseable response.
    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// The provider could not be reached or is failing; distinct from a
    /// well-formed rejection.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::Timeout => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Another writer created the same object first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ProviderError::Api { status: 409, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_unavailable() {
        assert!(ProviderError::Timeout.is_unavailable());
        assert!(ProviderError::api(502, "Bad Gateway").is_unavailable());
        assert!(!ProviderError::api(404, "Not Found").is_unavailable());
        assert!(!ProviderError::Unauthorized.is_unavailable());
        assert!(!ProviderError::TokenRejected.is_unavailable());
    }

    #[test]
    fn conflict_is_detected() {
        assert!(ProviderError::api(409, "exists").is_conflict());
        assert!(!ProviderError::api(400, "bad").is_conflict());
    }
}
