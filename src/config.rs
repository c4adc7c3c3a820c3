//! Configuration management
//!
//! Layers, lowest to highest: defaults, the YAML file, the CDK outputs file
//! written by `cdk deploy --outputs-file`, the bare variables the demo has
//! always read (`COGNITO_CLIENT_ID`, `HOSTEDUIPATH`, ...), and finally
//! `COGNITO_PLAYGROUND_<SECTION>__<KEY>` variables.

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::{Error, Result};

/// Scopes requested from the hosted UI
pub const DEFAULT_SCOPES: &[&str] = &[
    "aws.cognito.signin.user.admin",
    "email",
    "openid",
    "phone",
    "profile",
];

/// Bare environment variables and the config keys they set
const LEGACY_ENV: &[(&str, &str)] = &[
    ("COGNITO_CLIENT_ID", "cognito.client_id"),
    ("COGNITO_CLIENT_SECRET", "cognito.client_secret"),
    ("REDIRECT_URI", "cognito.redirect_uri"),
    ("HOSTEDUIPATH", "cognito.hosted_ui_path"),
    ("USER_POOL_ID", "cognito.user_pool_id"),
    ("AWS_REGION", "cognito.region"),
    ("STACK_NAME", "cognito.stack_name"),
];

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User pool and app client
    pub cognito: CognitoConfig,
    /// Outbound HTTP
    pub http: HttpConfig,
    /// Session web app
    pub web: WebConfig,
    /// Password-grant API backend
    pub api: ApiConfig,
    /// Local HTTP API with the token authorizer
    pub gateway: GatewayConfig,
}

/// User pool and app client settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitoConfig {
    /// App client id
    #[serde(deserialize_with = "scalar_string")]
    pub client_id: Option<String>,
    /// App client secret
    #[serde(deserialize_with = "scalar_string")]
    pub client_secret: Option<String>,
    /// Callback registered on the app client
    #[serde(deserialize_with = "scalar_string")]
    pub redirect_uri: Option<String>,
    /// Hosted UI base URL, e.g. `https://prefix.auth.us-east-1.amazoncognito.com`
    #[serde(deserialize_with = "scalar_string")]
    pub hosted_ui_path: Option<String>,
    /// User pool id, e.g. `us-east-1_AbCdEf`
    #[serde(deserialize_with = "scalar_string")]
    pub user_pool_id: Option<String>,
    /// AWS region (derived from the pool id or hosted UI when unset)
    #[serde(deserialize_with = "scalar_string")]
    pub region: Option<String>,
    /// Override for the user-pool API endpoint
    #[serde(deserialize_with = "scalar_string")]
    pub idp_endpoint: Option<String>,
    /// Scopes requested at login
    pub scopes: Vec<String>,
    /// CDK outputs file
    pub outputs_file: PathBuf,
    /// Stack whose outputs to read from `outputs_file`
    pub stack_name: String,
}

impl Default for CognitoConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            hosted_ui_path: None,
            user_pool_id: None,
            region: None,
            idp_endpoint: None,
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            outputs_file: PathBuf::from("cdk_outputs.json"),
            stack_name: "CognitoPlaygroundStack".to_string(),
        }
    }
}

impl fmt::Debug for CognitoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CognitoConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uri", &self.redirect_uri)
            .field("hosted_ui_path", &self.hosted_ui_path)
            .field("user_pool_id", &self.user_pool_id)
            .field("region", &self.region)
            .field("idp_endpoint", &self.idp_endpoint)
            .field("scopes", &self.scopes)
            .field("outputs_file", &self.outputs_file)
            .field("stack_name", &self.stack_name)
            .finish()
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for every call to the identity provider
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Session web app configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Secret the session cookie key is derived from (random per process when unset)
    pub session_secret: Option<String>,
    /// Mark cookies `Secure`
    pub secure_cookies: bool,
    /// Lifetime of the session cookie
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            session_secret: None,
            secure_cookies: false,
            session_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl fmt::Debug for WebConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<redacted>"))
            .field("secure_cookies", &self.secure_cookies)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

/// Password-grant API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Local HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// App clients the authorizer accepts (defaults to `cognito.client_id`)
    pub client_ids: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            client_ids: Vec::new(),
        }
    }
}

/// Outputs of the user-pool stack as written by `cdk deploy --outputs-file`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutputs {
    /// `CognitoClientId`
    #[serde(rename(deserialize = "CognitoClientId"), skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// `CognitoClientSecret`
    #[serde(rename(deserialize = "CognitoClientSecret"), skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// `RedirectUri`
    #[serde(rename(deserialize = "RedirectUri"), skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// `HostedUiPath`
    #[serde(rename(deserialize = "HostedUiPath"), skip_serializing_if = "Option::is_none")]
    pub hosted_ui_path: Option<String>,
    /// `UserPoolId`
    #[serde(rename(deserialize = "UserPoolId"), skip_serializing_if = "Option::is_none")]
    pub user_pool_id: Option<String>,
}

impl StackOutputs {
    /// Read one stack's outputs from a CDK outputs file.
    ///
    /// A missing file or a file without the stack is not an error: the
    /// values can still come from the environment.
    pub fn load(path: &Path, stack_name: &str) -> Result<Option<Self>> {
        if !path.exists() {
            info!(
                path = %path.display(),
                "No CDK outputs file found, configuration must come from the environment"
            );
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let mut stacks: HashMap<String, Self> = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid outputs file {}: {e}", path.display())))?;

        let outputs = stacks.remove(stack_name);
        if outputs.is_none() {
            warn!(path = %path.display(), stack = %stack_name, "Stack not present in outputs file");
        } else {
            debug!(path = %path.display(), stack = %stack_name, "Loaded stack outputs");
        }
        Ok(outputs)
    }
}

/// Validated settings for the hosted-UI OAuth2 endpoints
#[derive(Clone)]
pub struct HostedUiSettings {
    /// App client id
    pub client_id: String,
    /// App client secret
    pub client_secret: String,
    /// Callback URL
    pub redirect_uri: Url,
    /// Hosted UI base URL
    pub hosted_ui: Url,
    /// Requested scopes
    pub scopes: Vec<String>,
}

impl fmt::Debug for HostedUiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedUiSettings")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("hosted_ui", &self.hosted_ui.as_str())
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Validated settings for the user-pool `InitiateAuth` API
#[derive(Clone)]
pub struct IdpSettings {
    /// App client id
    pub client_id: String,
    /// App client secret
    pub client_secret: String,
    /// User-pool API endpoint
    pub endpoint: Url,
}

impl fmt::Debug for IdpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdpSettings")
            .field("client_id", &self.client_id)
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

/// Validated settings for the token authorizer
#[derive(Debug, Clone)]
pub struct AuthorizerSettings {
    /// Expected `iss` claim
    pub issuer: String,
    /// Accepted app client ids
    pub client_ids: Vec<String>,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
        }

        // The outputs file location is itself configurable, so resolve it first.
        let first: Self = Self::figment(path, None)
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        let outputs =
            StackOutputs::load(&first.cognito.outputs_file, &first.cognito.stack_name)?;

        Self::figment(path, outputs.as_ref())
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    fn figment(path: Option<&Path>, outputs: Option<&StackOutputs>) -> Figment {
        let mut figment = Figment::new();

        if let Some(p) = path {
            figment = figment.merge(Yaml::file(p));
        }

        if let Some(outputs) = outputs {
            figment = figment.merge(Serialized::default("cognito", outputs));
        }

        figment
            .merge(legacy_env())
            .merge(Env::prefixed("COGNITO_PLAYGROUND_").split("__"))
    }

    /// Settings the web app needs
    pub fn hosted_ui_settings(&self) -> Result<HostedUiSettings> {
        let c = &self.cognito;
        let mut missing = Vec::new();
        check_present(&c.client_id, "COGNITO_CLIENT_ID", &mut missing);
        check_present(&c.client_secret, "COGNITO_CLIENT_SECRET", &mut missing);
        check_present(&c.redirect_uri, "REDIRECT_URI", &mut missing);
        check_present(&c.hosted_ui_path, "HOSTEDUIPATH", &mut missing);
        missing_vars_error(&missing)?;

        Ok(HostedUiSettings {
            client_id: c.client_id.clone().unwrap_or_default(),
            client_secret: c.client_secret.clone().unwrap_or_default(),
            redirect_uri: parse_url("REDIRECT_URI", c.redirect_uri.as_deref())?,
            hosted_ui: parse_url("HOSTEDUIPATH", c.hosted_ui_path.as_deref())?,
            scopes: c.scopes.clone(),
        })
    }

    /// Settings the API backend needs
    pub fn idp_settings(&self) -> Result<IdpSettings> {
        let c = &self.cognito;
        let mut missing = Vec::new();
        check_present(&c.client_id, "COGNITO_CLIENT_ID", &mut missing);
        check_present(&c.client_secret, "COGNITO_CLIENT_SECRET", &mut missing);
        missing_vars_error(&missing)?;

        let endpoint = match &c.idp_endpoint {
            Some(endpoint) => parse_url("cognito.idp_endpoint", Some(endpoint))?,
            None => {
                let region = c.resolve_region().ok_or_else(|| {
                    Error::Config(
                        "Cannot determine the AWS region: set AWS_REGION, USER_POOL_ID or HOSTEDUIPATH"
                            .to_string(),
                    )
                })?;
                parse_url(
                    "cognito.region",
                    Some(&format!("https://cognito-idp.{region}.amazonaws.com/")),
                )?
            }
        };

        Ok(IdpSettings {
            client_id: c.client_id.clone().unwrap_or_default(),
            client_secret: c.client_secret.clone().unwrap_or_default(),
            endpoint,
        })
    }

    /// Settings the token authorizer needs
    pub fn authorizer_settings(&self) -> Result<AuthorizerSettings> {
        let c = &self.cognito;
        let pool_id = c
            .user_pool_id
            .clone()
            .ok_or_else(|| Error::Config("Missing required ENV VAR: USER_POOL_ID".to_string()))?;
        let region = c.resolve_region().ok_or_else(|| {
            Error::Config("Cannot determine the AWS region for the user pool".to_string())
        })?;

        let client_ids = if self.gateway.client_ids.is_empty() {
            c.client_id.iter().cloned().collect::<Vec<_>>()
        } else {
            self.gateway.client_ids.clone()
        };
        if client_ids.is_empty() {
            return Err(Error::Config(
                "The authorizer needs at least one app client: set COGNITO_CLIENT_ID or gateway.client_ids"
                    .to_string(),
            ));
        }

        Ok(AuthorizerSettings {
            issuer: format!("https://cognito-idp.{region}.amazonaws.com/{pool_id}"),
            client_ids,
        })
    }
}

impl CognitoConfig {
    /// The region: explicit, else the pool id prefix, else the hosted UI host
    #[must_use]
    pub fn resolve_region(&self) -> Option<String> {
        if let Some(region) = self.region.as_ref().filter(|r| !r.is_empty()) {
            return Some(region.clone());
        }
        if let Some((region, _)) = self.user_pool_id.as_deref().and_then(|id| id.split_once('_')) {
            if !region.is_empty() {
                return Some(region.to_string());
            }
        }
        self.hosted_ui_path
            .as_deref()
            .and_then(|p| Url::parse(p).ok())
            .and_then(|u| u.host_str().and_then(region_from_hosted_ui_host))
    }
}

/// `prefix.auth.eu-west-1.amazoncognito.com` → `eu-west-1`
fn region_from_hosted_ui_host(host: &str) -> Option<String> {
    let rest = host.strip_suffix(".amazoncognito.com")?;
    let (_, region) = rest.split_once(".auth.")?;
    (!region.is_empty()).then(|| region.to_string())
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map_or_else(|| key.as_str().to_owned(), |(_, path)| (*path).to_owned())
            .into()
    })
}

/// Env values are parsed, so `COGNITO_CLIENT_ID=12345` arrives as a number.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Signed(i64),
        Unsigned(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Text(s) => s,
        Scalar::Signed(n) => n.to_string(),
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

fn check_present(value: &Option<String>, name: &'static str, missing: &mut Vec<&'static str>) {
    if value.as_deref().is_none_or(str::is_empty) {
        missing.push(name);
    }
}

fn missing_vars_error(missing: &[&str]) -> Result<()> {
    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::Config(format!(
        "Missing required ENV VARs: {}",
        missing.join(", ")
    )))
}

fn parse_url(name: &str, value: Option<&str>) -> Result<Url> {
    let value = value.unwrap_or_default();
    Url::parse(value).map_err(|e| Error::Config(format!("{name} is not a valid URL ({value}): {e}")))
}
