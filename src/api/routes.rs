//! API backend routes

use axum::{
    Form, Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, info};

use super::{ActiveUser, ApiError, ApiState, User};
use crate::Error;
use crate::token::CompositeToken;

/// Create the API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/token", post(login_for_access_token))
        .route("/users/me/", get(read_users_me))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// OAuth2 password-grant form
#[derive(Deserialize)]
struct PasswordForm {
    username: String,
    password: String,
    grant_type: Option<String>,
    #[serde(default)]
    scope: String,
}

/// Body of a successful `POST /token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// `access++++++id`
    pub access_token: String,
    /// Cognito refresh token
    pub refresh_token: String,
    /// Usually `Bearer`
    pub token_type: String,
}

/// POST /token
async fn login_for_access_token(
    State(state): State<ApiState>,
    WithRejection(Form(form), _): WithRejection<Form<PasswordForm>, ApiError>,
) -> Result<Json<TokenResponse>, ApiError> {
    if form
        .grant_type
        .as_deref()
        .is_some_and(|grant| !grant.is_empty() && grant != "password")
    {
        return Err(ApiError::UnsupportedGrantType);
    }
    if !form.scope.is_empty() {
        debug!(scope = %form.scope, "Ignoring requested scope, the pool decides");
    }

    let tokens = state.idp.initiate_auth(&form.username, &form.password).await?;
    let refresh_token = tokens.refresh_token.ok_or_else(|| {
        ApiError::Upstream(Error::Internal(
            "InitiateAuth did not return a refresh token".to_string(),
        ))
    })?;

    info!("Issued composite token");
    Ok(Json(TokenResponse {
        access_token: CompositeToken::new(tokens.access_token, tokens.id_token).join(),
        refresh_token,
        token_type: tokens.token_type,
    }))
}

/// GET /users/me/
async fn read_users_me(ActiveUser(user): ActiveUser) -> Json<User> {
    Json(user)
}
