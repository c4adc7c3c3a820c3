//! Lambda entry point for the deployed function pair
//!
//! Built as `bootstrap` for the `provided.al2023` runtime; the stack sets
//! `FUNCTION_HANDLER` to pick the public or private handler.

use std::process::ExitCode;

use tracing::error;

use cognito_playground::gateway::{FunctionName, lambda};
use cognito_playground::setup_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    // CloudWatch keeps one record per line
    if let Err(e) = setup_tracing("info", Some("json")) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let function = match FunctionName::from_env() {
        Ok(f) => f,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match lambda::run(function).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
