//! Cognito Playground Library
//!
//! Two ways of putting a Cognito user pool in front of an application, plus
//! the infrastructure both rely on.
//!
//! # Features
//!
//! - **Web app**: authorization-code grant through the hosted UI, tokens kept
//!   in a server-side session, one refresh when the id token expires
//! - **API backend**: resource-owner-password grant via `InitiateAuth`, a
//!   composite bearer token, and bearer validation on every request
//! - **Gateway**: a public/private function pair behind a local HTTP API with
//!   a user-pool JWT authorizer
//! - **Infra**: CloudFormation for the user pool and the HTTP API
//!
//! Tokens are inspected without checking signatures; an expired token never
//! grants access.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cli;
pub mod cognito;
pub mod config;
pub mod error;
pub mod gateway;
pub mod infra;
pub mod server;
pub mod token;
pub mod web;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json())
                .try_init()
                .map_err(|e| Error::Internal(e.to_string()))?;
        }
        _ => {
            subscriber
                .with(fmt::layer())
                .try_init()
                .map_err(|e| Error::Internal(e.to_string()))?;
        }
    }

    Ok(())
}
