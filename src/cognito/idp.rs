//! User-pool API client for the password flow
//!
//! `InitiateAuth` is one of the few user-pool actions that needs no AWS
//! signature: the app client id (plus `SECRET_HASH` when the client has a
//! secret) is the credential.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{KeyInit, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, info, warn};

use super::TokenSet;
use crate::config::IdpSettings;
use crate::{Error, Result};

const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Client for the user-pool `InitiateAuth` action
#[derive(Clone)]
pub struct IdentityProviderClient {
    http: Client,
    settings: IdpSettings,
}

impl IdentityProviderClient {
    /// Create a client for the configured user pool
    #[must_use]
    pub fn new(http: Client, settings: IdpSettings) -> Self {
        Self { http, settings }
    }

    /// Authenticate a user with `USER_PASSWORD_AUTH`
    pub async fn initiate_auth(&self, username: &str, password: &str) -> Result<TokenSet> {
        let hash = secret_hash(username, &self.settings.client_id, &self.settings.client_secret)?;
        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.settings.client_id,
            "AuthParameters": {
                "USERNAME": username,
                "PASSWORD": password,
                "SECRET_HASH": hash,
            },
        });

        debug!(endpoint = %self.settings.endpoint, "Calling InitiateAuth");

        let response = self
            .http
            .post(self.settings.endpoint.clone())
            .header("X-Amz-Target", INITIATE_AUTH_TARGET)
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON)
            .body(body.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let parsed: Option<ErrorBody> = serde_json::from_str(&text).ok();
            let (kind, message) = match parsed {
                Some(ErrorBody { kind, message }) => (
                    kind.map(|k| short_exception_name(&k).to_string())
                        .unwrap_or_else(|| format!("HTTP {status}")),
                    message.unwrap_or(text),
                ),
                None => (format!("HTTP {status}"), text),
            };
            warn!(kind = %kind, "InitiateAuth rejected");
            return Err(Error::IdentityProvider { kind, message });
        }

        let text = response.text().await?;
        let parsed: InitiateAuthResponse = serde_json::from_str(&text)?;

        match (parsed.authentication_result, parsed.challenge_name) {
            (Some(result), _) => {
                info!("Password authentication succeeded");
                Ok(TokenSet {
                    id_token: result.id_token,
                    access_token: result.access_token,
                    refresh_token: result.refresh_token,
                    token_type: result.token_type.unwrap_or_else(|| "Bearer".to_string()),
                    expires_in: result.expires_in,
                })
            }
            (None, Some(challenge)) => Err(Error::ChallengeRequired(challenge)),
            (None, None) => Err(Error::Internal(
                "InitiateAuth returned neither tokens nor a challenge".to_string(),
            )),
        }
    }
}

/// Compute the `SECRET_HASH` for an app client with a secret:
/// base64(HMAC-SHA256(client secret, username ‖ client id)).
pub fn secret_hash(username: &str, client_id: &str, client_secret: &str) -> Result<String> {
    let mut mac = hmac::Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
        .map_err(|e| Error::Internal(format!("Invalid client secret: {e}")))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// `com.amazonaws...#NotAuthorizedException` → `NotAuthorizedException`
fn short_exception_name(kind: &str) -> &str {
    kind.rsplit_once('#').map_or(kind, |(_, name)| name)
}
