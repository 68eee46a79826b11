//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth::tokens::TokenError;
use crate::config::ConfigError;
use minimalism_coach_core::crypto::CryptoError;
use minimalism_coach_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A request body failed validation. The message is shown to the caller.
    #[error("{0}")]
    Validation(String),

    /// Registration attempted with an email that is already taken.
    #[error("An account with this email already exists.")]
    DuplicateEmail,

    /// Login failed. Deliberately identical for unknown emails and wrong
    /// passwords so the response does not reveal which one it was.
    #[error("Invalid email or password.")]
    InvalidCredentials,

    /// No usable bearer token on a protected route.
    #[error("Authentication required.")]
    Unauthorized,

    /// Bearer token problems (expired, revoked, malformed).
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The server no longer holds the caller's vault key in memory.
    #[error("Please log in again to unlock your encrypted data.")]
    ReauthenticationRequired,

    /// Authenticated but lacking the required role.
    #[error("Admin access required.")]
    Forbidden,

    /// A named resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The caller exceeded the chat rate limit.
    #[error("Too many requests. Please wait a moment before trying again.")]
    RateLimited,

    /// Vault sealing or opening failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Represents an error related to the WebSocket connection.
    #[error("WebSocket Error: {0}")]
    Websocket(#[from] axum::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status and user-facing message for this error.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::DuplicateEmail => (StatusCode::CONFLICT, self.to_string()),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Token(err) => (StatusCode::UNAUTHORIZED, err.to_string()),
            ApiError::ReauthenticationRequired => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ApiError::Crypto(CryptoError::VaultTooLarge { .. }) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            // A tag that fails to verify means the caller's cached key no
            // longer matches the blob. The stored data is left untouched.
            ApiError::Crypto(CryptoError::AuthenticationFailed) => (
                StatusCode::UNAUTHORIZED,
                "Could not unlock your encrypted data. Please log in again.".to_string(),
            ),
            ApiError::Port(PortError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Port(PortError::AlreadyExists(_)) => (
                StatusCode::CONFLICT,
                "An account with this email already exists.".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred.".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("request failed: {:?}", self);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
