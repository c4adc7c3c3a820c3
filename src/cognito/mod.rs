//! Clients for the two Cognito surfaces the playground talks to
//!
//! - [`HostedUiClient`]: the OAuth2 endpoints behind the hosted UI
//!   (`/oauth2/authorize`, `/oauth2/token`) for the authorization-code and
//!   refresh-token grants
//! - [`IdentityProviderClient`]: the user-pool JSON API (`InitiateAuth`) for
//!   the resource-owner-password flow

mod hosted_ui;
mod idp;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use hosted_ui::{HostedUiClient, LoginRequest};
pub use idp::{IdentityProviderClient, secret_hash};

use crate::Result;

/// Tokens issued by the user pool
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// OpenID Connect id token
    pub id_token: String,
    /// OAuth2 access token
    pub access_token: String,
    /// Refresh token; absent after a refresh grant, which does not rotate it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Usually `Bearer`
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Build the shared outbound HTTP client
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("cognito-playground/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Into::into)
}
