//! Bearer-token extractors for the API backend

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ApiError;
use crate::token::{CompositeToken, decode_unverified};

/// The user described by a composite bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The access token's `sub`
    pub username: String,
    /// The id token's `email`
    pub email: String,
    /// Tokens the pool issues always describe an enabled user
    #[serde(default)]
    pub disabled: bool,
}

impl User {
    /// Build a user from a composite `access++++++id` bearer string.
    ///
    /// Only the access token's expiry is checked; the id token just
    /// supplies the email.
    pub fn from_bearer(bearer: &str) -> Result<Self, ApiError> {
        let composite = CompositeToken::parse(bearer).map_err(|e| {
            debug!(error = %e, "Bearer is not a composite token");
            ApiError::InvalidCredentials
        })?;

        let access = decode_unverified(&composite.access_token).map_err(|e| {
            debug!(error = %e, "Access token failed to decode");
            ApiError::InvalidCredentials
        })?;

        if access.claims.is_expired() {
            return Err(ApiError::ExpiredToken);
        }

        let username = access.claims.sub.ok_or(ApiError::InvalidCredentials)?;

        let id = decode_unverified(&composite.id_token).map_err(|e| {
            debug!(error = %e, "Id token failed to decode");
            ApiError::InvalidCredentials
        })?;
        let email = id.claims.email.ok_or(ApiError::InvalidCredentials)?;

        Ok(Self {
            username,
            email,
            disabled: false,
        })
    }
}

/// Any user with a decodable, unexpired bearer token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bearer = bearer_token(parts).ok_or(ApiError::NotAuthenticated)?;
        User::from_bearer(bearer).map(Self)
    }
}

/// A [`CurrentUser`] that is not disabled
#[derive(Debug, Clone)]
pub struct ActiveUser(pub User);

impl<S> FromRequestParts<S> for ActiveUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.disabled {
            return Err(ApiError::InactiveUser);
        }
        Ok(Self(user))
    }
}

/// The credentials of an `Authorization: Bearer <token>` header.
/// The scheme is matched case-insensitively.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credentials) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let credentials = credentials.trim();
    (!credentials.is_empty()).then_some(credentials)
}
