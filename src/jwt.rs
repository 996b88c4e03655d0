use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::AppError;

/// Validates bearer tokens issued by the identity provider.
///
/// With `public_key_pem` set, tokens must be RS256-signed by the provider's
/// realm key. Otherwise they are checked as HS256 against `secret`, which is
/// what the in-memory mode and tests use.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub public_key_pem: Option<Arc<Vec<u8>>>,
    pub issuer: Option<String>,
    /// Client whose `resource_access` roles count as principal roles.
    pub client_id: String,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let public_key_pem = match std::env::var("JWT_PUBLIC_KEY").ok().filter(|val| !val.trim().is_empty()) {
            Some(value) => Some(read_public_key(&value)?),
            None => None,
        };
        let secret = match std::env::var("JWT_SECRET") {
            Ok(secret) => secret,
            // The secret only signs tooling tokens once a public key is configured.
            Err(_) if public_key_pem.is_some() => String::new(),
            Err(_) => return Err(AppError::configuration("JWT_SECRET or JWT_PUBLIC_KEY must be set")),
        };
        let issuer = std::env::var("JWT_ISSUER").ok().filter(|val| !val.is_empty());
        let client_id = std::env::var("AUTH_CLIENT_ID").unwrap_or_else(|_| "test-client".to_string());

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            public_key_pem: public_key_pem.map(Arc::new),
            issuer,
            client_id,
        })
    }

    /// Signs claims with the shared secret. The provider issues real tokens;
    /// this is used by tooling and tests.
    pub fn encode(&self, claims: &Claims) -> Result<String, AppError> {
        jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let (key, algorithm) = match &self.public_key_pem {
            Some(pem) => (
                DecodingKey::from_rsa_pem(pem).map_err(|err| AppError::configuration(err.to_string()))?,
                Algorithm::RS256,
            ),
            None => (DecodingKey::from_secret(&self.secret), Algorithm::HS256),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.validate_aud = false;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        jsonwebtoken::decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }

    /// Realm roles plus the roles granted on this service's client.
    pub fn principal(&self, claims: Claims, access_token: String) -> Principal {
        let mut roles: HashSet<String> = claims
            .realm_access
            .map(|access| access.roles.into_iter().collect())
            .unwrap_or_default();

        if let Some(access) = claims
            .resource_access
            .and_then(|mut clients| clients.remove(&self.client_id))
        {
            roles.extend(access.roles);
        }

        Principal::new(claims.sub, access_token)
            .with_roles(roles)
            .with_username(claims.preferred_username)
    }
}

/// `JWT_PUBLIC_KEY` holds either the PEM text or a path to a PEM file.
fn read_public_key(value: &str) -> Result<Vec<u8>, AppError> {
    let pem = if value.trim_start().starts_with("-----BEGIN") {
        value.replace("\\n", "\n").into_bytes()
    } else {
        std::fs::read(value).map_err(|err| AppError::configuration(format!("JWT_PUBLIC_KEY ({value}): {err}")))?
    };
    DecodingKey::from_rsa_pem(&pem).map_err(|err| AppError::configuration(format!("JWT_PUBLIC_KEY: {err}")))?;
    Ok(pem)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleClaims {
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RoleClaims>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_access: Option<HashMap<String, RoleClaims>>,
}

impl Claims {
    pub fn new(sub: impl Into<String>, valid_for: chrono::Duration) -> Self {
        let now = chrono::Utc::now();
        Self {
            sub: sub.into(),
            exp: (now + valid_for).timestamp() as usize,
            iat: now.timestamp() as usize,
            iss: None,
            preferred_username: None,
            realm_access: None,
            resource_access: None,
        }
    }

    pub fn with_client_roles(mut self, client_id: &str, roles: &[&str]) -> Self {
        let access = self.resource_access.get_or_insert_with(HashMap::new);
        access.insert(
            client_id.to_string(),
            RoleClaims {
                roles: roles.iter().map(|r| r.to_string()).collect(),
            },
        );
        self
    }
}

/// The caller, if any. A missing `Authorization` header yields an anonymous
/// caller; the pipeline decides whether that is acceptable. A header that is
/// present but invalid is rejected outright.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Principal>);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
            return Ok(Caller(None));
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("malformed Authorization header"))?;

        let claims = state.jwt.decode(token)?;
        Ok(Caller(Some(state.jwt.principal(claims, token.to_string()))))
    }
}
