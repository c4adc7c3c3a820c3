//! Server-side sessions for the web app
//!
//! Three Cognito tokens do not fit in a 4 KB cookie, so the tokens stay in
//! process memory and the browser only holds an encrypted session id.

use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

pub(crate) const SESSION_COOKIE: &str = "playground_session";
pub(crate) const STATE_COOKIE: &str = "playground_oauth_state";
const CALLBACK_PATH: &str = "/callbacks/cognito";

/// Tokens held for one logged-in browser
#[derive(Clone)]
pub struct Session {
    /// Id token
    pub id_token: String,
    /// Access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
}

/// In-memory session map
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty store whose sessions live for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Store a new session and return its id
    pub fn create(&self, id_token: String, access_token: String, refresh_token: String) -> String {
        self.purge_expired();

        let id = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            id.clone(),
            Session {
                id_token,
                access_token,
                refresh_token,
                created_at: Utc::now(),
            },
        );
        debug!(sessions = self.sessions.len(), "Session created");
        id
    }

    /// Look up a live session
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let session = self.sessions.get(id)?.clone();
        if self.is_stale(&session) {
            self.sessions.remove(id);
            return None;
        }
        Some(session)
    }

    /// Replace the id and access tokens after a refresh.
    /// Returns `false` when the session no longer exists.
    pub fn update_tokens(&self, id: &str, id_token: String, access_token: String) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                session.id_token = id_token;
                session.access_token = access_token;
                true
            }
            None => false,
        }
    }

    /// Drop a session
    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Number of stored sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn is_stale(&self, session: &Session) -> bool {
        let age = Utc::now().signed_duration_since(session.created_at);
        age.to_std().is_ok_and(|age| age > self.ttl)
    }

    fn purge_expired(&self) {
        self.sessions.retain(|_, session| !self.is_stale(session));
    }
}

fn cookie_duration(ttl: Duration) -> time::Duration {
    time::Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

/// Session id cookie
pub(crate) fn session_cookie(session_id: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(cookie_duration(ttl))
        .build()
}

/// Removal cookie for the session id
pub(crate) fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Short-lived cookie holding the OAuth `state` between login and callback
pub(crate) fn state_cookie(state: String, secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, state))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(CALLBACK_PATH)
        .max_age(time::Duration::minutes(5))
        .build()
}

/// Removal cookie for the OAuth `state`
pub(crate) fn clear_state_cookie() -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, "")).path(CALLBACK_PATH).build()
}
