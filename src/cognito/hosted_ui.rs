//! Hosted UI OAuth2 client
//!
//! Authorization-code and refresh-token grants against `/oauth2/token`,
//! authenticated with the app client's id and secret (HTTP Basic).

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::TokenSet;
use crate::config::HostedUiSettings;
use crate::{Error, Result};

/// Raw token endpoint response; which fields are present depends on the grant
#[derive(Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

/// Where to send the browser to log in, and the `state` to expect back
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// Hosted UI authorize URL
    pub url: String,
    /// CSRF state echoed back on the callback
    pub state: String,
}

/// Client for the hosted UI's OAuth2 endpoints
#[derive(Clone)]
pub struct HostedUiClient {
    http: Client,
    settings: HostedUiSettings,
    authorize_url: Url,
    token_url: Url,
}

impl HostedUiClient {
    /// Create a client for the configured hosted UI
    pub fn new(http: Client, settings: HostedUiSettings) -> Result<Self> {
        let authorize_url = endpoint(&settings.hosted_ui, "oauth2/authorize")?;
        let token_url = endpoint(&settings.hosted_ui, "oauth2/token")?;
        Ok(Self {
            http,
            settings,
            authorize_url,
            token_url,
        })
    }

    /// The token endpoint this client posts to
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Build the hosted UI login URL with a fresh `state`
    #[must_use]
    pub fn login_url(&self) -> LoginRequest {
        let state = generate_state();
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.settings.scopes.join(" "))
            .append_pair("redirect_uri", self.settings.redirect_uri.as_str())
            .append_pair("state", &state);

        LoginRequest {
            url: url.into(),
            state,
        }
    }

    /// Exchange an authorization code for id, access and refresh tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.settings.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];

        let response = self.token_request(&params, "code exchange").await?;
        if response.refresh_token.is_none() {
            return Err(Error::Internal(
                "Token endpoint did not return a refresh_token for the code exchange".to_string(),
            ));
        }

        info!("Exchanged authorization code for tokens");
        into_token_set(response)
    }

    /// Exchange a refresh token for a new id token and access token.
    ///
    /// Cognito does not rotate refresh tokens, so the returned set has
    /// `refresh_token: None`; keep using the one you have.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];

        let mut response = self.token_request(&params, "refresh").await?;
        response.refresh_token = None;

        info!("Refreshed tokens");
        into_token_set(response)
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        operation: &'static str,
    ) -> Result<TokenResponse> {
        debug!(url = %self.token_url, operation, "Calling token endpoint");

        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenEndpoint { status, body });
        }

        response.json::<TokenResponse>().await.map_err(Into::into)
    }
}

fn into_token_set(response: TokenResponse) -> Result<TokenSet> {
    let id_token = response
        .id_token
        .ok_or_else(|| Error::Internal("Token response missing id_token".to_string()))?;
    let access_token = response
        .access_token
        .ok_or_else(|| Error::Internal("Token response missing access_token".to_string()))?;

    Ok(TokenSet {
        id_token,
        access_token,
        refresh_token: response.refresh_token,
        token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
        expires_in: response.expires_in,
    })
}

/// `https://host` + `oauth2/token`, tolerating a trailing slash on the base
fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let joined = format!("{}/{path}", base.as_str().trim_end_matches('/'));
    Url::parse(&joined).map_err(|e| Error::Config(format!("Invalid hosted UI URL {joined}: {e}")))
}

/// Generate a random state parameter
fn generate_state() -> String {
    let state_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(state_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> HostedUiSettings {
        HostedUiSettings {
            client_id: "client123".to_string(),
            client_secret: "s3cret".to_string(),
            redirect_uri: Url::parse("http://localhost:3000/callbacks/cognito/login").unwrap(),
            hosted_ui: Url::parse("https://demo.auth.us-east-1.amazoncognito.com").unwrap(),
            scopes: crate::config::DEFAULT_SCOPES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    #[test]
    fn login_url_carries_the_code_grant_parameters() {
        let client = HostedUiClient::new(Client::new(), settings()).unwrap();
        let login = client.login_url();

        assert!(login.url.starts_with(
            "https://demo.auth.us-east-1.amazoncognito.com/oauth2/authorize?"
        ));
        assert!(login.url.contains("client_id=client123"));
        assert!(login.url.contains("response_type=code"));
        assert!(login.url.contains(
            "scope=aws.cognito.signin.user.admin+email+openid+phone+profile"
        ));
        assert!(login.url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallbacks%2Fcognito%2Flogin"
        ));
        assert!(login.url.contains(&format!("state={}", login.state)));
    }

    #[test]
    fn login_state_is_unique_per_call() {
        let client = HostedUiClient::new(Client::new(), settings()).unwrap();
        assert_ne!(client.login_url().state, client.login_url().state);
    }

    #[test]
    fn state_is_base64url_safe() {
        for _ in 0..10 {
            let state = generate_state();
            assert!(!state.contains('+'));
            assert!(!state.contains('/'));
            assert!(!state.contains('='));
            assert!(state.len() >= 20);
        }
    }

    #[test]
    fn token_url_tolerates_trailing_slash() {
        let mut s = settings();
        s.hosted_ui = Url::parse("https://demo.auth.us-east-1.amazoncognito.com/").unwrap();
        let client = HostedUiClient::new(Client::new(), s).unwrap();
        assert_eq!(
            client.token_url().as_str(),
            "https://demo.auth.us-east-1.amazoncognito.com/oauth2/token"
        );
    }

    #[test]
    fn token_set_requires_id_and_access_tokens() {
        let missing_id = TokenResponse {
            id_token: None,
            access_token: Some("a".to_string()),
            refresh_token: None,
            token_type: None,
            expires_in: None,
        };
        assert!(into_token_set(missing_id).is_err());

        let complete = TokenResponse {
            id_token: Some("i".to_string()),
            access_token: Some("a".to_string()),
            refresh_token: Some("r".to_string()),
            token_type: None,
            expires_in: Some(3600),
        };
        let set = into_token_set(complete).unwrap();
        assert_eq!(set.token_type, "Bearer");
        assert_eq!(set.refresh_token.as_deref(), Some("r"));
    }
}
