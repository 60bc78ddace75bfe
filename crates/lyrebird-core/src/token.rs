//! Access token expiry inspection.
//!
//! Access tokens are three-segment signed tokens; the middle segment is
//! URL-safe unpadded base64 JSON carrying an `exp` claim in unix seconds.
//! The signature is never verified client-side: the server remains the
//! validator, the client only reads the expiry to schedule renewal.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use thiserror::Error;

/// Token decode error.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token is not a three-segment token")]
    Malformed,
    #[error("Token payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Token payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Token payload carries no expiry claim")]
    MissingExpiry,
}

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Extract the expiry timestamp from an access token, as unix milliseconds.
///
/// # Errors
/// Returns `TokenError` when the token is structurally invalid or carries
/// no expiry claim.
pub fn expiry_millis(token: &str) -> Result<i64, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Malformed);
    }

    let raw = URL_SAFE_NO_PAD.decode(parts[1])?;
    let claims: Claims = serde_json::from_slice(&raw)?;

    claims
        .exp
        .map(|seconds| seconds.saturating_mul(1000))
        .ok_or(TokenError::MissingExpiry)
}
