// Authentication error types

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::models::AuthResponse;

/// Refresh attempted with something other than a refresh token
pub const REASON_NOT_REFRESH_TOKEN: &str = "not a refresh token";
/// Refresh token verified but past its expiration
pub const REASON_REFRESH_EXPIRED: &str = "refresh token expired";

/// Token codec failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Signing key or lifetimes unusable; raised at startup
    #[error("Token configuration error: {0}")]
    Configuration(String),

    /// Bad signature, corrupt encoding or missing mandatory claim
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// User store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Insert rejected because the email is already registered
    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::DuplicateEmail;
            }
        }
        StoreError::Database(err.to_string())
    }
}

/// Failures of the signup, login and refresh flows
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already exists")]
    DuplicateEmail,

    /// Never says which factor failed
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Subject authenticated but no longer present in the store
    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Body missing, not JSON, or not the expected shape
    #[error("Malformed request body: {0}")]
    MalformedBody(#[from] JsonRejection),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::Database(msg) => AuthError::Database(msg),
        }
    }
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::PrincipalNotFound => StatusCode::UNAUTHORIZED,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::MalformedBody(rejection) => rejection.status(),
            AuthError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to send to clients (no internal detail)
    pub fn error_message(&self) -> String {
        match self {
            AuthError::DuplicateEmail => "Email already exists".to_string(),
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::InvalidToken(reason) if reason == REASON_REFRESH_EXPIRED => {
                "Refresh token expired".to_string()
            }
            AuthError::InvalidToken(_) => "Invalid refresh token".to_string(),
            AuthError::PrincipalNotFound => "Authentication failed".to_string(),
            AuthError::Validation(errors) => {
                let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
                fields.sort_unstable();
                format!("Invalid request fields: {}", fields.join(", "))
            }
            AuthError::MalformedBody(rejection) => rejection.body_text(),
            AuthError::PasswordHash(_) | AuthError::Token(_) | AuthError::Database(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Auth flow failed: {}", self);
        } else if matches!(self, AuthError::InvalidToken(_) | AuthError::PrincipalNotFound) {
            warn!("Auth flow rejected: {}", self);
        }

        (status, Json(AuthResponse::failure(self.error_message()))).into_response()
    }
}
