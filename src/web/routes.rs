//! Web app routes

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use super::WebState;
use super::session::{
    SESSION_COOKIE, STATE_COOKIE, clear_session_cookie, clear_state_cookie, session_cookie,
    state_cookie,
};
use crate::Error;
use crate::token::token_is_valid;

const NOT_LOGGED_IN: &str = "<p>Not logged in. <a href='/login'>Login in here.</a></p>";
const EXPIRED_AFTER_REFRESH: &str =
    "<p>Expired token. <a href='/login'>Login in again here.</a></p>";

/// Create the web app router
pub fn create_router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route("/callbacks/cognito/login", get(callback))
        .route("/private", get(private))
        .route("/logout", get(logout))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Failures the web app renders as HTML
#[derive(Debug)]
enum WebError {
    /// Malformed or forged callback
    BadRequest(&'static str),
    /// Missing or expired credentials
    Unauthorized(&'static str),
    /// The identity provider call failed
    Upstream(Error),
}

impl From<Error> for WebError {
    fn from(e: Error) -> Self {
        Self::Upstream(e)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Html(format!("<p>{message}</p>"))).into_response()
            }
            Self::Unauthorized(body) => (StatusCode::UNAUTHORIZED, Html(body)).into_response(),
            Self::Upstream(e) => {
                error!(error = %e, "Identity provider request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Html("<p>Identity provider request failed</p>"),
                )
                    .into_response()
            }
        }
    }
}

async fn index() -> Html<&'static str> {
    Html("<p>Hello, World!</p>")
}

/// GET /login - redirect to the hosted UI
async fn login(State(state): State<WebState>, jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    let request = state.hosted_ui.login_url();
    let jar = jar.add(state_cookie(request.state, state.secure_cookies));
    (jar, Redirect::to(&request.url))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /callbacks/cognito/login - exchange the authorization code for tokens
async fn callback(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Html<&'static str>), WebError> {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or("Unknown error");
        warn!(error = %error, description = %description, "Hosted UI returned an error");
        return Err(WebError::BadRequest("Login failed"));
    }

    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(WebError::BadRequest("Missing authorization code"))?;

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_owned());
    if !state_matches(expected.as_deref(), params.state.as_deref()) {
        warn!("OAuth state mismatch");
        return Err(WebError::BadRequest("Invalid state parameter"));
    }

    let tokens = state.hosted_ui.exchange_code(code).await?;

    if !token_is_valid(&tokens.id_token) {
        return Err(WebError::Unauthorized("<p>Expired token</p>"));
    }

    let refresh_token = tokens.refresh_token.unwrap_or_default();
    let session_id = state
        .sessions
        .create(tokens.id_token, tokens.access_token, refresh_token);
    info!("User logged in");

    let jar = jar
        .remove(clear_state_cookie())
        .add(session_cookie(session_id, state.session_ttl, state.secure_cookies));

    Ok((
        jar,
        Html("<p>Success. Go to <a href='/private'>the private area</a></p>"),
    ))
}

/// GET /private - require a valid id token, refreshing it once if expired
async fn private(
    State(state): State<WebState>,
    jar: PrivateCookieJar,
) -> Result<Html<&'static str>, WebError> {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(WebError::Unauthorized(NOT_LOGGED_IN))?;

    let session = state
        .sessions
        .get(&session_id)
        .filter(|s| !s.id_token.is_empty())
        .ok_or(WebError::Unauthorized(NOT_LOGGED_IN))?;

    if !token_is_valid(&session.id_token) {
        let refreshed = state.hosted_ui.refresh(&session.refresh_token).await?;

        if !token_is_valid(&refreshed.id_token) {
            return Err(WebError::Unauthorized(EXPIRED_AFTER_REFRESH));
        }

        info!("Token refreshed");
        state
            .sessions
            .update_tokens(&session_id, refreshed.id_token, refreshed.access_token);
    }

    Ok(Html("<p>Welcome to the secret space!</p>"))
}

/// GET /logout - forget the session
async fn logout(State(state): State<WebState>, jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    (jar.remove(clear_session_cookie()), Redirect::to("/"))
}

/// Both values must be present and equal; compared in constant time
fn state_matches(expected: Option<&str>, received: Option<&str>) -> bool {
    match (expected, received) {
        (Some(expected), Some(received)) if !expected.is_empty() => {
            expected.as_bytes().ct_eq(received.as_bytes()).into()
        }
        _ => false,
    }
}
