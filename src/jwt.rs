//! Advisory JWT inspection.
//!
//! Tokens are decoded without checking the signature. The result only decides
//! when to renew an access token ahead of time; the backend stays the
//! authority on whether a token is valid.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Renew the access token when it expires within this many seconds.
pub const TOKEN_REFRESH_THRESHOLD_SECS: u64 = 120;

/// Decode the payload (second segment) of a JWT.
///
/// Returns `None` for anything that is not three dot-separated segments with
/// a base64 JSON object in the middle.
pub fn decode(token: &str) -> Option<Map<String, Value>> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    // Accept padded and standard-alphabet input as well
    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD.decode(normalized).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

/// The `exp` claim in Unix seconds, if present and numeric.
pub fn expires_at(token: &str) -> Option<i64> {
    let claims = decode(token)?;
    match claims.get("exp")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

/// Whether the token expires within `threshold_secs` of now.
/// Undecodable tokens and tokens without `exp` count as expiring.
pub fn is_expiring_soon(token: &str, threshold_secs: u64) -> bool {
    is_expiring_soon_at(token, threshold_secs, now_secs())
}

/// Same as [`is_expiring_soon`] with an explicit clock.
pub fn is_expiring_soon_at(token: &str, threshold_secs: u64, now: i64) -> bool {
    match expires_at(token) {
        Some(exp) => exp.saturating_sub(now) < threshold_secs as i64,
        None => true,
    }
}

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
