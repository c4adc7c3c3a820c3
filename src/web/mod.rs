//! Server-rendered web app using the authorization-code grant
//!
//! `/login` sends the browser to the hosted UI, the callback exchanges the
//! code for tokens and opens a session, and `/private` checks the id token,
//! refreshing it once if it has expired.

mod routes;
mod session;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use tracing::warn;

pub use routes::create_router;
pub use session::{Session, SessionStore};

use crate::cognito::HostedUiClient;
use crate::config::WebConfig;

/// Shared state of the web app
#[derive(Clone)]
pub struct WebState {
    /// Hosted UI client
    pub hosted_ui: Arc<HostedUiClient>,
    /// Session map
    pub sessions: Arc<SessionStore>,
    cookie_key: Key,
    secure_cookies: bool,
    session_ttl: Duration,
}

impl WebState {
    /// Build the state for the given hosted UI and cookie settings
    #[must_use]
    pub fn new(hosted_ui: HostedUiClient, config: &WebConfig) -> Self {
        let cookie_key = match config.session_secret.as_deref() {
            Some(secret) if !secret.is_empty() => derive_key(secret),
            _ => {
                warn!("No web.session_secret set, sessions will not survive a restart");
                Key::generate()
            }
        };

        Self {
            hosted_ui: Arc::new(hosted_ui),
            sessions: Arc::new(SessionStore::new(config.session_ttl)),
            cookie_key,
            secure_cookies: config.secure_cookies,
            session_ttl: config.session_ttl,
        }
    }

    /// Key that encrypts the session and state cookies
    #[must_use]
    pub fn cookie_key(&self) -> &Key {
        &self.cookie_key
    }
}

impl FromRef<WebState> for Key {
    fn from_ref(state: &WebState) -> Self {
        state.cookie_key.clone()
    }
}

/// The cookie key needs 64 bytes; SHA-512 stretches any secret to that.
fn derive_key(secret: &str) -> Key {
    let mut hasher = Sha512::new();
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    Key::from(digest.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_key_is_stable_for_a_secret() {
        let a = derive_key("ThisIsSuperSecret");
        let b = derive_key("ThisIsSuperSecret");
        let c = derive_key("SomethingElse");
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }
}
