//! Unverified local inspection of bearer tokens
//!
//! Nothing here checks a signature. The decoded claims are a hint used to avoid
//! sending a token that is already known to be stale; they must never be used to
//! make authorization decisions.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Claims read from the payload segment of a JWT-shaped token without verification
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnverifiedClaims {
    /// Expiry, seconds since the Unix epoch
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl UnverifiedClaims {
    /// Subject claim, if it is a string
    pub fn subject(&self) -> Option<&str> {
        self.other.get("sub").and_then(Value::as_str)
    }
}

/// Local expiry hint for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryHint {
    /// Decodable with an expiry in the future
    Valid { expires_at: i64 },
    /// Decodable with an expiry at or before now
    Expired,
    /// Not JWT-shaped, or no usable `exp` claim
    Unknown,
}

impl ExpiryHint {
    /// Anything other than a positive `Valid` reading counts as expired
    pub const fn is_expired(self) -> bool {
        !matches!(self, Self::Valid { .. })
    }
}

/// Decode the middle segment of a three-part dot-delimited token as JSON.
///
/// Returns `None` for any malformed input.
pub fn decode_unverified_claims(token: &str) -> Option<UnverifiedClaims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Expiry hint for `token` relative to `now` (seconds since the Unix epoch)
pub fn unverified_expiry_hint(token: &str, now: i64) -> ExpiryHint {
    match decode_unverified_claims(token).and_then(|claims| claims.exp) {
        Some(exp) if exp > now => ExpiryHint::Valid { expires_at: exp },
        Some(_) => ExpiryHint::Expired,
        None => ExpiryHint::Unknown,
    }
}

/// Current time in seconds since the Unix epoch
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// True if the token cannot be decoded or its expiry is at or before now
pub fn is_expired_hint(token: &str) -> bool {
    unverified_expiry_hint(token, now_timestamp()).is_expired()
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    #[allow(clippy::cast_possible_truncation)]
    Ok(value.and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.floor() as i64))))
}
