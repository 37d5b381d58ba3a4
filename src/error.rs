use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    gate::Denial,
    mailer::MailError,
    media::MediaError,
    password::HashError,
    repository::RepositoryError,
    token::{AuthError, SignError},
};

/// Result alias used by every handler.
pub type ApiResult<T> = Result<T, ApiError>;

/// ApiError
///
/// The error taxonomy of the HTTP surface. Each variant owns its status code;
/// server-side failures are logged in full and answered with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad input shape, size or type (400).
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, forged or expired credential (401).
    #[error(transparent)]
    Authentication(#[from] AuthError),

    /// Login failure. Deliberately identical for unknown email and wrong password (401).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Valid identity, insufficient role (403).
    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Duplicate unique field (409).
    #[error("{0}")]
    Conflict(String),

    /// I/O or persistence failure (500).
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the caller. Server errors never leak their cause.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Storage(_) | ApiError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => ApiError::Authentication(AuthError::Missing),
            Denial::Forbidden => ApiError::Forbidden(denial.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::TooLarge { .. } | MediaError::UnsupportedType(_) => {
                ApiError::Validation(e.to_string())
            }
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(message) => ApiError::Conflict(message),
            RepositoryError::Backend(message) => ApiError::Storage(message),
        }
    }
}

impl From<SignError> for ApiError {
    fn from(e: SignError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<HashError> for ApiError {
    fn from(e: HashError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<MailError> for ApiError {
    fn from(e: MailError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
