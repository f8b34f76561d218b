//! Client error types

use crate::types::ErrorBody;
use reqwest::StatusCode;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad credentials or any non-2xx answer to the password grant
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// No response reached the client
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The refresh grant was rejected or could not be completed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The session could not be renewed and has been cleared
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// Server answered 401 and no further recovery is possible
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Any other non-2xx response
    #[error("Server error {status}: {message}")]
    Http { status: u16, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::AuthenticationFailed(message),
            _ => Self::Http {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Build an error from a non-2xx response, preferring the `{error}` body
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let message = match response.text().await {
            Ok(body) => error_message(status, &body),
            Err(err) => {
                debug!("Failed to read error body: {err}");
                fallback_message(status)
            }
        };
        Self::from_status(status, message)
    }

    /// Status code carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationFailed(_) | Self::SessionExpired => Some(401),
            Self::Http { status, .. } => Some(*status),
            Self::Network(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Whether the error means the caller has to log in again
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_) | Self::SessionExpired | Self::RefreshFailed(_)
        )
    }
}

/// Extract a human readable message from an error body
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback_message(status)
    } else {
        trimmed.to_string()
    }
}

fn fallback_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| status.to_string(), str::to_string)
}
