//! User-pool JWT authorizer
//!
//! Mirrors the checks an HTTP API JWT authorizer makes against a user pool:
//! - issuer is `https://cognito-idp.{region}.amazonaws.com/{pool}`
//! - the token has not expired
//! - `aud` (id tokens) or `client_id` (access tokens) names an allowed app client
//!
//! The signature is not checked.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use super::functions::{AuthorizerContext, JwtContext};
use crate::config::AuthorizerSettings;
use crate::token::{Claims, TokenError, decode_unverified, now_unix};

/// Why a token was refused
#[derive(Debug, Error)]
pub enum AuthorizerError {
    /// No `Authorization` header
    #[error("missing Authorization header")]
    MissingToken,

    /// The token could not be decoded
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Issued by another pool
    #[error("unexpected issuer {0:?}")]
    Issuer(Option<String>),

    /// Past its `exp`
    #[error("token expired")]
    Expired,

    /// Issued to an app client that is not allowed here
    #[error("token not issued to an allowed app client")]
    Audience,
}

/// Authorizer bound to one user pool and its app clients
#[derive(Debug, Clone)]
pub struct UserPoolAuthorizer {
    issuer: String,
    client_ids: Vec<String>,
}

impl UserPoolAuthorizer {
    /// Build an authorizer from validated settings
    #[must_use]
    pub fn new(settings: AuthorizerSettings) -> Self {
        Self {
            issuer: settings.issuer,
            client_ids: settings.client_ids,
        }
    }

    /// Expected `iss`
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Check the raw `Authorization` header value
    pub fn authorize(&self, authorization: Option<&str>) -> Result<Claims, AuthorizerError> {
        self.authorize_at(authorization, now_unix())
    }

    /// [`Self::authorize`] against a fixed clock
    pub fn authorize_at(
        &self,
        authorization: Option<&str>,
        now: i64,
    ) -> Result<Claims, AuthorizerError> {
        let token = authorization
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
            .filter(|t| !t.is_empty())
            .ok_or(AuthorizerError::MissingToken)?;

        let claims = decode_unverified(token)?.claims;

        if claims.iss.as_deref() != Some(self.issuer.as_str()) {
            return Err(AuthorizerError::Issuer(claims.iss));
        }

        if claims.is_expired_at(now) {
            return Err(AuthorizerError::Expired);
        }

        let allowed = |id: &str| self.client_ids.iter().any(|c| c == id);
        let audience_ok = claims.audiences().into_iter().any(allowed)
            || claims.client_id.as_deref().is_some_and(allowed);
        if !audience_ok {
            return Err(AuthorizerError::Audience);
        }

        Ok(claims)
    }
}

/// Build the context forwarded to the function
#[must_use]
pub fn authorizer_context(claims: &Claims) -> AuthorizerContext {
    let scopes = claims.scope.as_ref().map(|_| {
        claims
            .scopes()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    });

    let claims = match serde_json::to_value(claims) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };

    AuthorizerContext {
        jwt: JwtContext { claims, scopes },
    }
}

/// Authorizer middleware: rejects with 401 or stashes the context for the handler
pub async fn authorizer_middleware(
    State(authorizer): State<Arc<UserPoolAuthorizer>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authorizer.authorize(authorization) {
        Ok(claims) => {
            debug!(path = %path, sub = ?claims.sub, "Authorized request");
            request.extensions_mut().insert(authorizer_context(&claims));
            next.run(request).await
        }
        Err(e) => {
            warn!(path = %path, reason = %e, "Authorizer rejected request");
            unauthorized_response()
        }
    }
}

/// The HTTP API's 401 body
fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Unauthorized" })),
    )
        .into_response()
}
