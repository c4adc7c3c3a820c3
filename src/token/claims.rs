//! Unverified JWT decoding and the expiry check

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::Header;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};
use tracing::debug;

use super::TokenError;

/// Claims carried by a Cognito id or access token.
///
/// Only the fields the playground branches on are typed; everything else
/// (`cognito:username`, `auth_time`, `jti`, ...) lands in [`Claims::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry (Unix timestamp)
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,

    /// Issued-at (Unix timestamp)
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,

    /// Subject: the user's immutable id in the pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer: `https://cognito-idp.{region}.amazonaws.com/{pool}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience (id tokens). A string or an array of strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Value>,

    /// App client id (access tokens carry this instead of `aud`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// `id` or `access`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    /// Email address (id tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Username (access tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Space-separated scopes (access tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Every other claim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Whether the token expired before `now`.
    ///
    /// A token without `exp` is treated as expired: nothing the pool issues
    /// lacks one, so its absence means the token did not come from the pool.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp.is_none_or(|exp| exp < now)
    }

    /// Whether the token has expired as of the wall clock
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_unix())
    }

    /// Audience values, whether `aud` is a single string or an array
    #[must_use]
    pub fn audiences(&self) -> Vec<&str> {
        match &self.aud {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Scopes granted to an access token
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// NumericDate, whole or fractional seconds, floored to whole seconds.
///
/// Flooring keeps `exp < now` exact for an integer `now`.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    number
        .as_i64()
        .or_else(|| number.as_f64().map(|secs| secs.floor() as i64))
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid NumericDate {number}")))
}

/// A decoded token whose signature has NOT been checked
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    /// JOSE header (`alg`, `kid`, ...)
    pub header: Header,
    /// Payload claims
    pub claims: Claims,
}

/// Current Unix time in seconds
#[must_use]
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Decode a compact JWT without verifying its signature.
pub fn decode_unverified(token: &str) -> Result<UnverifiedToken, TokenError> {
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(TokenError::Malformed);
    };

    let header = jsonwebtoken::decode_header(token)?;
    let payload = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    let claims: Claims = serde_json::from_slice(&payload)?;

    Ok(UnverifiedToken { header, claims })
}

/// Decode a token and check that it is still valid.
///
/// Empty, undecodable and expired tokens are all invalid.
#[must_use]
pub fn token_is_valid(token: &str) -> bool {
    match decode_unverified(token) {
        Ok(decoded) => !decoded.claims.is_expired(),
        Err(e) => {
            debug!(error = %e, "Token failed to decode");
            false
        }
    }
}
