//! The public/private function pair behind the HTTP API
//!
//! Events and responses follow the API Gateway HTTP API payload format 2.0,
//! so the same handlers answer both the local gateway and the deployed
//! `bootstrap` functions (see [`super::lambda`]).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::Error;

/// Environment variable the deployed functions read to pick their handler
pub const HANDLER_ENV: &str = "FUNCTION_HANDLER";

/// Which of the two functions to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    /// `GET /public`
    Public,
    /// `GET /private`
    Private,
}

impl FunctionName {
    /// Handler name as stored in [`HANDLER_ENV`]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public_handler",
            Self::Private => "private_handler",
        }
    }

    /// The handler named by [`HANDLER_ENV`]
    pub fn from_env() -> Result<Self, Error> {
        std::env::var(HANDLER_ENV)
            .map_err(|_| Error::Config(format!("{HANDLER_ENV} is not set")))?
            .parse()
    }

    /// Run the handler
    #[must_use]
    pub fn invoke(self, event: &ProxyEvent) -> ProxyResponse {
        match self {
            Self::Public => public_handler(event),
            Self::Private => private_handler(event),
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FunctionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public_handler" | "public" => Ok(Self::Public),
            "private_handler" | "private" => Ok(Self::Private),
            other => Err(Error::Config(format!("Unknown function handler: {other}"))),
        }
    }
}

/// HTTP API proxy event (payload format 2.0)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    /// Always `2.0`
    pub version: String,
    /// `GET /private`
    pub route_key: String,
    /// Request path
    pub raw_path: String,
    /// Query string without the `?`
    #[serde(default)]
    pub raw_query_string: String,
    /// Request headers, lower-cased
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Gateway-provided context
    pub request_context: RequestContext,
    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Whether `body` is base64
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// Request context of a proxy event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Unique request id
    pub request_id: String,
    /// Route that matched
    pub route_key: String,
    /// Stage name
    pub stage: String,
    /// Method and path
    pub http: HttpDescription,
    /// Present only on routes with an authorizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<AuthorizerContext>,
}

/// Method and path of the request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDescription {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Protocol, e.g. `HTTP/1.1`
    pub protocol: String,
}

/// What the authorizer learned about the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizerContext {
    /// JWT authorizer output
    pub jwt: JwtContext,
}

/// Claims and scopes of an authorized token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwtContext {
    /// Token claims
    pub claims: Map<String, Value>,
    /// Access-token scopes, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl ProxyEvent {
    /// Describe an incoming request as a proxy event
    #[must_use]
    pub fn from_parts(parts: &Parts, body: Option<String>, authorizer: Option<AuthorizerContext>) -> Self {
        let method = parts.method.to_string();
        let path = parts.uri.path().to_string();
        let route_key = format!("{method} {path}");

        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            version: "2.0".to_string(),
            route_key: route_key.clone(),
            raw_path: path.clone(),
            raw_query_string: parts.uri.query().unwrap_or_default().to_string(),
            headers,
            request_context: RequestContext {
                request_id: Uuid::new_v4().to_string(),
                route_key,
                stage: "$default".to_string(),
                http: HttpDescription {
                    method,
                    path,
                    protocol: format!("{:?}", parts.version),
                },
                authorizer,
            },
            body,
            is_base64_encoded: false,
        }
    }

    /// Claims forwarded by the authorizer
    #[must_use]
    pub fn claims(&self) -> Option<&Map<String, Value>> {
        self.request_context
            .authorizer
            .as_ref()
            .map(|a| &a.jwt.claims)
    }
}

/// Proxy integration response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    /// HTTP status
    pub status_code: u16,
    /// Response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Response body
    pub body: String,
}

/// `GET /public`
#[must_use]
pub fn public_handler(_event: &ProxyEvent) -> ProxyResponse {
    json_response(&json!({ "message": "Hello, World!" }))
}

/// `GET /private`; only reached once the authorizer accepted the token
#[must_use]
pub fn private_handler(_event: &ProxyEvent) -> ProxyResponse {
    json_response(&json!({ "message": "Hello, Authorized World!" }))
}

fn json_response(body: &Value) -> ProxyResponse {
    ProxyResponse {
        status_code: 200,
        headers: BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())]),
        body: body.to_string(),
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or_else(|_| {
            warn!(status = self.status_code, "Function returned an invalid status");
            StatusCode::BAD_GATEWAY
        });

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => warn!(header = %name, "Dropping invalid response header"),
            }
        }

        response
    }
}
