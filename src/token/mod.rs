//! JWT inspection for Cognito-issued tokens
//!
//! Cognito signs its tokens, but neither client here checks the signature:
//! the web app and the API backend only look at the payload to decide
//! whether a token has expired. Verifying signatures is the job of the API
//! gateway's authorizer in a deployed stack.
//!
//! - [`decode_unverified`] splits a compact JWT and parses its header and claims
//! - [`token_is_valid`] is the single expiry gate used by both clients
//! - [`CompositeToken`] carries an access token and an id token as one bearer string

mod claims;
mod composite;

pub use claims::{Claims, UnverifiedToken, decode_unverified, now_unix, token_is_valid};
pub use composite::{CompositeToken, TOKEN_DELIMITER};

/// Errors raised while inspecting a token
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No token was supplied
    #[error("token is empty")]
    Empty,

    /// The token is not a three-segment compact JWT
    #[error("token is not a three-part JWT")]
    Malformed,

    /// The header segment could not be parsed
    #[error("invalid JWT header: {0}")]
    Header(#[from] jsonwebtoken::errors::Error),

    /// The payload segment is not base64url
    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload is not a JSON claims object
    #[error("payload is not a JSON claims object: {0}")]
    Payload(#[from] serde_json::Error),

    /// A composite bearer token did not contain both halves
    #[error("composite token must contain an access token and an id token")]
    IncompleteComposite,
}
