//! Shared fixtures: token minting and a throwaway identity provider
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Form, Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

use cognito_playground::cognito::secret_hash;
use cognito_playground::config::{DEFAULT_SCOPES, HostedUiSettings, IdpSettings};

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
pub const USERNAME: &str = "user@example.com";
pub const PASSWORD: &str = "Password123!";
pub const SUB: &str = "4f1c7a9e-1111-2222-3333-444455556666";
pub const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_rjf4huGs2";

/// Current Unix time
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// HS256 token; nothing under test checks the signature
pub fn mint(claims: &Value) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(b"fake-idp-signing-key"),
    )
    .expect("token encodes")
}

/// An id token expiring `offset` seconds from now
pub fn id_token(offset: i64) -> String {
    mint(&json!({
        "sub": SUB,
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "token_use": "id",
        "email": USERNAME,
        "cognito:username": SUB,
        "exp": now() + offset,
        "iat": now() - 60,
    }))
}

/// An access token expiring `offset` seconds from now
pub fn access_token(offset: i64) -> String {
    mint(&json!({
        "sub": SUB,
        "iss": ISSUER,
        "client_id": CLIENT_ID,
        "token_use": "access",
        "scope": "openid email",
        "username": SUB,
        "exp": now() + offset,
        "iat": now() - 60,
    }))
}

/// How often each endpoint of the fake was hit
#[derive(Debug, Default)]
pub struct Calls {
    pub code_exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub initiate_auth: AtomicUsize,
}

impl Calls {
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn code_exchanges(&self) -> usize {
        self.code_exchanges.load(Ordering::SeqCst)
    }

    pub fn initiate_auth(&self) -> usize {
        self.initiate_auth.load(Ordering::SeqCst)
    }
}

/// Hosted UI token endpoint and user-pool API on one local port.
///
/// Codes: `good-code` (valid tokens), `expired-code` (expired id token).
/// Refresh tokens: `good-refresh` (fresh tokens), `stale-refresh` (expired id token).
/// Anything else is `invalid_grant`.
pub struct FakeIdp {
    pub base_url: Url,
    pub calls: Arc<Calls>,
}

impl FakeIdp {
    pub async fn start() -> Self {
        let calls = Arc::new(Calls::default());
        let app = Router::new()
            .route("/oauth2/token", post(token_endpoint))
            .route("/", post(initiate_auth))
            .with_state(Arc::clone(&calls));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake idp serves");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("url"),
            calls,
        }
    }

    pub fn hosted_ui_settings(&self) -> HostedUiSettings {
        HostedUiSettings {
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            redirect_uri: Url::parse("http://localhost:3000/callbacks/cognito/login").expect("url"),
            hosted_ui: self.base_url.clone(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn idp_settings(&self) -> IdpSettings {
        IdpSettings {
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            endpoint: self.base_url.clone(),
        }
    }
}

/// Client that never routes 127.0.0.1 through a proxy
pub fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("client")
}

fn oauth_error(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "error": error }))).into_response()
}

async fn token_endpoint(
    State(calls): State<Arc<Calls>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let expected = format!("Basic {}", STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}")));
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return oauth_error(StatusCode::UNAUTHORIZED, "invalid_client");
    }

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            calls.code_exchanges.fetch_add(1, Ordering::SeqCst);
            if form.get("redirect_uri").is_none() {
                return oauth_error(StatusCode::BAD_REQUEST, "invalid_request");
            }
            let id = match form.get("code").map(String::as_str) {
                Some("good-code") => id_token(3600),
                Some("expired-code") => id_token(-60),
                _ => return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant"),
            };
            Json(json!({
                "id_token": id,
                "access_token": access_token(3600),
                "refresh_token": "good-refresh",
                "token_type": "Bearer",
                "expires_in": 3600,
            }))
            .into_response()
        }
        Some("refresh_token") => {
            calls.refreshes.fetch_add(1, Ordering::SeqCst);
            let id = match form.get("refresh_token").map(String::as_str) {
                Some("good-refresh") => id_token(3600),
                Some("stale-refresh") => id_token(-60),
                _ => return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant"),
            };
            Json(json!({
                "id_token": id,
                "access_token": access_token(3600),
                "token_type": "Bearer",
                "expires_in": 3600,
            }))
            .into_response()
        }
        _ => oauth_error(StatusCode::BAD_REQUEST, "unsupported_grant_type"),
    }
}

fn amz_error(kind: &str, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(header::CONTENT_TYPE, "application/x-amz-json-1.1")],
        json!({ "__type": kind, "message": message }).to_string(),
    )
        .into_response()
}

async fn initiate_auth(State(calls): State<Arc<Calls>>, headers: HeaderMap, body: String) -> Response {
    calls.initiate_auth.fetch_add(1, Ordering::SeqCst);

    let target = headers.get("x-amz-target").and_then(|v| v.to_str().ok());
    if target != Some("AWSCognitoIdentityProviderService.InitiateAuth") {
        return amz_error("UnknownOperationException", "unexpected target");
    }

    let Ok(request) = serde_json::from_str::<Value>(&body) else {
        return amz_error("SerializationException", "body is not JSON");
    };
    if request["AuthFlow"] != "USER_PASSWORD_AUTH" || request["ClientId"] != CLIENT_ID {
        return amz_error("InvalidParameterException", "unexpected flow or client");
    }

    let params = &request["AuthParameters"];
    let username = params["USERNAME"].as_str().unwrap_or_default();
    let password = params["PASSWORD"].as_str().unwrap_or_default();
    let expected_hash = secret_hash(username, CLIENT_ID, CLIENT_SECRET).expect("hash");
    if params["SECRET_HASH"] != expected_hash.as_str() {
        return amz_error(
            "NotAuthorizedException",
            "Client is configured with secret but SECRET_HASH was not received",
        );
    }

    let body = match (username, password) {
        (USERNAME, PASSWORD) => json!({
            "AuthenticationResult": {
                "AccessToken": access_token(3600),
                "IdToken": id_token(3600),
                "RefreshToken": "good-refresh",
                "TokenType": "Bearer",
                "ExpiresIn": 3600,
            },
            "ChallengeParameters": {},
        }),
        ("new@example.com", _) => json!({
            "ChallengeName": "NEW_PASSWORD_REQUIRED",
            "Session": "opaque-session",
            "ChallengeParameters": {},
        }),
        _ => return amz_error("NotAuthorizedException", "Incorrect username or password."),
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-amz-json-1.1")
        .body(Body::from(body.to_string()))
        .expect("response")
}

/// Collect a response body as text
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

/// Collect a response body as JSON
pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).expect("json body")
}

/// `name=value` of the named `Set-Cookie`, ready for a `Cookie` header
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
        .find(|pair| pair.starts_with(&format!("{name}=")))
}
