//! Errors returned by the backend REST client.

use thiserror::Error;

use crate::token::TokenStoreError;

/// Generic message shown when the server gives no usable explanation.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors that can occur when talking to the backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The operation needs a signed-in user and no token is stored.
    #[error("Not signed in")]
    Unauthenticated,

    /// The backend rejected the bearer token (HTTP 401).
    #[error("Session expired")]
    Unauthorized,

    /// Resource not found (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Signing in succeeded but the token could not be persisted.
    #[error("Token storage error: {0}")]
    TokenStore(#[from] TokenStoreError),
}

impl ApiError {
    /// Text suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please log in to continue".to_string(),
            Self::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            Self::NotFound(_) => "The requested item could not be found".to_string(),
            Self::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Whether the error means the session is no longer valid.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Unauthorized)
    }
}

/// Pull a human readable message out of an error body.
///
/// The backend answers errors with `{"message": ...}` or `{"error": ...}`;
/// anything else yields `None`.
pub(crate) fn extract_server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map(str::trim)
        .filter(|msg| !msg.is_empty())
        .map(String::from)
}
