use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::provider::ProviderError;

pub type AppResult<T> = Result<T, AppError>;

/// Field name -> validation messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("one or more validation failures have occurred")]
    Validation(FieldErrors),
    #[error("{subprocess} failed: {message}")]
    SubprocessFailure {
        subprocess: String,
        message: String,
        context: Option<String>,
        #[source]
        source: Option<ProviderError>,
    },
    #[error("authorization provider unavailable: {0}")]
    InfrastructureUnavailable(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Single-field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        Self::Validation(errors)
    }

    pub fn subprocess_failure(
        subprocess: impl Into<String>,
        message: impl Into<String>,
        context: Option<String>,
        source: Option<ProviderError>,
    ) -> Self {
        Self::SubprocessFailure {
            subprocess: subprocess.into(),
            message: message.into(),
            context,
            source,
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::InfrastructureUnavailable(message.into())
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subprocess: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SubprocessFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InfrastructureUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidOperation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();
        let error = match &self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Validation(_) => "validation",
            AppError::SubprocessFailure { .. } => "subprocess_failure",
            AppError::InfrastructureUnavailable(_) => "infrastructure_unavailable",
            AppError::InvalidOperation(_) => "invalid_operation",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        };

        let (errors, subprocess, context) = match self {
            AppError::Validation(errors) => (Some(errors), None, None),
            AppError::SubprocessFailure {
                subprocess,
                context,
                ..
            } => (None, Some(subprocess), context),
            _ => (None, None, None),
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
            errors,
            subprocess,
            context,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<crate::authz::CatalogError> for AppError {
    fn from(value: crate::authz::CatalogError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
