use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::utils::{ClinicError, Result};

/// The claims we read from a bearer token
///
/// Signatures are not checked; the backend that issued the token does that.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry in seconds since the Unix epoch
    pub exp: Option<f64>,
    pub sub: Option<serde_json::Value>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .and_then(|exp| DateTime::from_timestamp_millis((exp * 1000.0) as i64))
    }
}

/// Decode the payload segment of a JWT
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_header), Some(payload)) if !payload.is_empty() => payload,
        _ => return Err(ClinicError::InvalidToken("expected header.payload.signature".into())),
    };

    // Some issuers pad their segments; the URL-safe alphabet forbids it
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ClinicError::InvalidToken(format!("payload is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ClinicError::InvalidToken(format!("payload is not a JSON object: {e}")))
}

/// True when `token` decodes and its `exp` lies after `now`
///
/// A token without an `exp` claim is treated as invalid.
pub fn is_token_valid(token: &str, now: DateTime<Utc>) -> Result<bool> {
    let claims = decode_claims(token)?;
    Ok(claims.expires_at().is_some_and(|exp| exp > now))
}

#[cfg(test)]
pub(crate) fn make_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"42","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}
