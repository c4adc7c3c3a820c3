//! Password-grant API backend
//!
//! `POST /token` trades a username and password for Cognito tokens and hands
//! back the access and id tokens as one composite bearer string.
//! `GET /users/me/` reads that bearer string back and describes the user.

mod extractor;
mod routes;

use std::sync::Arc;

use axum::{
    Json,
    extract::rejection::FormRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

pub use extractor::{ActiveUser, CurrentUser, User};
pub use routes::{TokenResponse, create_router};

use crate::Error;
use crate::cognito::IdentityProviderClient;

/// Shared state of the API backend
#[derive(Clone)]
pub struct ApiState {
    /// User-pool API client
    pub idp: Arc<IdentityProviderClient>,
}

impl ApiState {
    /// Wrap a user-pool client
    #[must_use]
    pub fn new(idp: IdentityProviderClient) -> Self {
        Self { idp: Arc::new(idp) }
    }
}

/// Errors the API reports as `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    /// No bearer credentials on the request
    NotAuthenticated,
    /// The bearer token could not be decoded
    InvalidCredentials,
    /// The access token has expired
    ExpiredToken,
    /// The user is disabled
    InactiveUser,
    /// The user pool rejected the username or password
    IncorrectLogin,
    /// The user pool wants a challenge answered first
    ChallengeRequired(String),
    /// `grant_type` was present but not `password`
    UnsupportedGrantType,
    /// The token form could not be read
    InvalidForm(String),
    /// Talking to the user pool failed
    Upstream(Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated
            | Self::InvalidCredentials
            | Self::ExpiredToken
            | Self::IncorrectLogin
            | Self::ChallengeRequired(_) => StatusCode::UNAUTHORIZED,
            Self::InactiveUser => StatusCode::BAD_REQUEST,
            Self::UnsupportedGrantType | Self::InvalidForm(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::NotAuthenticated => "Not authenticated".to_string(),
            Self::InvalidCredentials => "Could not validate credentials".to_string(),
            Self::ExpiredToken => "Expired token".to_string(),
            Self::InactiveUser => "Inactive user".to_string(),
            Self::IncorrectLogin => "Incorrect username or password".to_string(),
            Self::ChallengeRequired(name) => format!("Authentication challenge required: {name}"),
            Self::UnsupportedGrantType => "grant_type must be 'password'".to_string(),
            Self::InvalidForm(reason) => reason.clone(),
            Self::Upstream(_) => "Identity provider request failed".to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        if e.is_rejected_credentials() {
            return Self::IncorrectLogin;
        }
        match e {
            Error::ChallengeRequired(name) => Self::ChallengeRequired(name),
            other => Self::Upstream(other),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        Self::InvalidForm(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "detail": self.detail() }));

        match &self {
            Self::Upstream(e) => error!(error = %e, "User pool request failed"),
            other => warn!(status = status.as_u16(), detail = %other.detail(), "Request rejected"),
        }

        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
