//! JWT payload introspection
//!
//! Tokens are decoded without signature verification. The claims are only
//! used to work out when the access token expires; trust decisions stay with
//! the backend.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Claims read from the middle segment of a JWT
///
/// Claims are read leniently: a known claim with an unexpected JSON type is
/// left as `None` (and kept in `extra`) instead of failing the whole decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedClaims {
    /// Subject; numeric ids are rendered as strings
    pub sub: Option<String>,
    pub email: Option<String>,
    /// Issued-at, seconds since the epoch
    pub iat: Option<f64>,
    /// Expiry, seconds since the epoch
    pub exp: Option<f64>,
    /// Every claim of the payload, including the known ones
    pub extra: Map<String, Value>,
}

impl DecodedClaims {
    /// Read the known claims out of a payload object
    pub fn from_map(payload: Map<String, Value>) -> Self {
        let text = |key: &str| match payload.get(key) {
            Some(Value::String(value)) => Some(value.clone()),
            Some(Value::Number(value)) => Some(value.to_string()),
            _ => None,
        };
        let seconds = |key: &str| payload.get(key).and_then(Value::as_f64);

        Self {
            sub: text("sub"),
            email: payload
                .get("email")
                .and_then(Value::as_str)
                .map(str::to_string),
            iat: seconds("iat"),
            exp: seconds("exp"),
            extra: payload,
        }
    }

    /// Expiry as milliseconds since the epoch
    pub fn expires_at_ms(&self) -> Option<f64> {
        self.exp.map(|exp| exp * 1000.0)
    }
}

/// Decode the payload of a three-segment token
///
/// Returns `None` for a wrong segment count, invalid Base64URL or a payload
/// that is not a JSON object.
pub fn decode_token(token: &str) -> Option<DecodedClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        tracing::trace!(segments = segments.len(), "token is not a three-segment JWT");
        return None;
    };

    let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::trace!("token payload is not Base64URL: {err}");
            return None;
        }
    };

    match serde_json::from_slice::<Map<String, Value>>(&bytes) {
        Ok(payload) => Some(DecodedClaims::from_map(payload)),
        Err(err) => {
            tracing::trace!("token payload is not a claims object: {err}");
            None
        }
    }
}

/// Current wall clock in milliseconds since the epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether the token is expired at `now_ms`
///
/// Missing claims or a missing `exp` count as expired.
pub fn is_token_expired_at(token: &str, now_ms: i64) -> bool {
    match decode_token(token).and_then(|claims| claims.expires_at_ms()) {
        Some(expires_at) => now_ms as f64 >= expires_at,
        None => true,
    }
}

/// Whether the token is expired right now
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, now_ms())
}

/// Time left before the token expires, measured from `now_ms`
///
/// Zero when the token is already expired or carries no `exp`.
pub fn time_until_expiry_at(token: &str, now_ms: i64) -> Duration {
    decode_token(token)
        .and_then(|claims| claims.expires_at_ms())
        .map_or(Duration::ZERO, |expires_at| {
            let remaining = expires_at - now_ms as f64;
            if remaining > 0.0 {
                Duration::from_millis(remaining as u64)
            } else {
                Duration::ZERO
            }
        })
}

/// Time left before the token expires
pub fn time_until_expiry(token: &str) -> Duration {
    time_until_expiry_at(token, now_ms())
}
