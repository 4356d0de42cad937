//! Error types for Seizmeia
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling. Errors raised while
//! serving a request map onto an HTTP status through [`IntoResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for Seizmeia operations
///
/// The authentication relay uses the first five variants; the remaining
/// ones cover configuration loading and the application shell.
#[derive(Error, Debug)]
pub enum SeizmeiaError {
    /// Malformed or missing configuration, detected at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity provider metadata could not be fetched or parsed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Missing or invalid request parameters, or an error reported by the
    /// identity provider on the redirect
    #[error("{0}")]
    BadRequest(String),

    /// Token endpoint exchange or refresh failed
    #[error("{0}")]
    Exchange(String),

    /// Identity token missing or rejected
    #[error("{0}")]
    Verification(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SeizmeiaError {
    /// HTTP status used when this error terminates a request.
    pub fn status(&self) -> StatusCode {
        match self {
            SeizmeiaError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SeizmeiaError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "rejected request");
        }
        (status, self.to_string()).into_response()
    }
}

/// Result type alias for Seizmeia operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Result type for the authentication relay, which needs the typed error to
/// pick a response status.
pub type AuthResult<T> = std::result::Result<T, SeizmeiaError>;
