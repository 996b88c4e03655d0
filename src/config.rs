use std::time::Duration;

use crate::errors::AppError;

const DEFAULT_REALM: &str = "Test";
const DEFAULT_CLIENT_ID: &str = "test-client";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Which authorization provider backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Remote Keycloak-compatible server
    Keycloak,
    /// In-process provider, development only
    Memory,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
    pub seed_on_start: bool,
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let kind = match std::env::var("AUTH_PROVIDER")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "" | "keycloak" => ProviderKind::Keycloak,
            "memory" => ProviderKind::Memory,
            other => {
                return Err(AppError::configuration(format!(
                    "AUTH_PROVIDER must be 'keycloak' or 'memory', got '{other}'"
                )))
            }
        };

        let (base_url, client_secret) = match kind {
            ProviderKind::Keycloak => (
                std::env::var("AUTH_SERVER_URL")
                    .map_err(|_| AppError::configuration("AUTH_SERVER_URL not set"))?,
                std::env::var("AUTH_CLIENT_SECRET")
                    .map_err(|_| AppError::configuration("AUTH_CLIENT_SECRET not set"))?,
            ),
            ProviderKind::Memory => (String::new(), String::new()),
        };

        let timeout_secs = std::env::var("AUTH_TIMEOUT_SECS")
            .map(|val| val.parse::<u64>())
            .unwrap_or(Ok(DEFAULT_TIMEOUT_SECS))
            .map_err(|_| AppError::configuration("AUTH_TIMEOUT_SECS must be a valid integer"))?;

        let seed_on_start = std::env::var("AUTH_SEED_ON_START")
            .map(|val| !matches!(val.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            realm: std::env::var("AUTH_REALM").unwrap_or_else(|_| DEFAULT_REALM.to_string()),
            client_id: std::env::var("AUTH_CLIENT_ID")
                .unwrap_or_else(|_| DEFAULT_CLIENT_ID.to_string()),
            client_secret,
            timeout: Duration::from_secs(timeout_secs),
            seed_on_start,
        })
    }

    /// Config pointing at an arbitrary server, used by tests and tooling.
    pub fn keycloak(base_url: impl Into<String>, realm: &str, client_id: &str, secret: &str) -> Self {
        let base_url: String = base_url.into();
        Self {
            kind: ProviderKind::Keycloak,
            base_url: base_url.trim_end_matches('/').to_string(),
            realm: realm.to_string(),
            client_id: client_id.to_string(),
            client_secret: secret.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            seed_on_start: false,
        }
    }

    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, self.realm
        )
    }

    pub fn protection_endpoint(&self) -> String {
        format!("{}/realms/{}/authz/protection", self.base_url, self.realm)
    }

    pub fn admin_endpoint(&self) -> String {
        format!("{}/admin/realms/{}", self.base_url, self.realm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_built_from_base_and_realm() {
        let config = ProviderConfig::keycloak("http://localhost:8080/", "Test", "test-client", "s");
        assert_eq!(
            config.token_endpoint(),
            "http://localhost:8080/realms/Test/protocol/openid-connect/token"
        );
        assert_eq!(
            config.protection_endpoint(),
            "http://localhost:8080/realms/Test/authz/protection"
        );
        assert_eq!(config.admin_endpoint(), "http://localhost:8080/admin/realms/Test");
    }
}
