//! Error types for the Cognito playground

use std::io;

use thiserror::Error;

use crate::token::TokenError;

/// Result type alias for the Cognito playground
pub type Result<T> = std::result::Result<T, Error>;

/// Cognito playground errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JWT could not be inspected
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// The hosted-UI token endpoint answered with a non-success status
    #[error("Token endpoint returned HTTP {status}: {body}")]
    TokenEndpoint {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The user-pool API rejected a request
    #[error("Identity provider error {kind}: {message}")]
    IdentityProvider {
        /// Exception name from the `__type` field (e.g. `NotAuthorizedException`)
        kind: String,
        /// Human-readable message
        message: String,
    },

    /// The user pool asked for a challenge instead of issuing tokens
    #[error("Authentication challenge required: {0}")]
    ChallengeRequired(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the identity provider rejected the end user's credentials
    #[must_use]
    pub fn is_rejected_credentials(&self) -> bool {
        matches!(
            self,
            Self::IdentityProvider { kind, .. }
                if kind == "NotAuthorizedException" || kind == "UserNotFoundException"
        )
    }

    /// Whether this error came from talking to the identity provider
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::TokenEndpoint { .. }
                | Self::IdentityProvider { .. }
                | Self::ChallengeRequired(_)
                | Self::Http(_)
        )
    }
}
