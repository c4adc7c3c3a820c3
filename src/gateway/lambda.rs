//! Lambda runtime adapter for the function pair

use lambda_runtime::{LambdaEvent, service_fn};
use tracing::{debug, info};

use super::functions::{FunctionName, ProxyEvent, ProxyResponse};
use crate::{Error, Result};

/// Serve invocations of `function` until the runtime stops
pub async fn run(function: FunctionName) -> Result<()> {
    info!(function = %function, "Starting Lambda runtime");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<ProxyEvent>| async move {
        Ok::<_, lambda_runtime::Error>(handle(
            function,
            &event.payload,
            &event.context.request_id,
        ))
    }))
    .await
    .map_err(|e| Error::Internal(format!("Lambda runtime failed: {e}")))
}

/// Answer a single invocation
#[must_use]
pub fn handle(function: FunctionName, event: &ProxyEvent, invocation_id: &str) -> ProxyResponse {
    debug!(
        function = %function,
        invocation = %invocation_id,
        route = %event.route_key,
        "Invoked"
    );
    function.invoke(event)
}
