//! Local HTTP API routes

use std::sync::Arc;

use axum::{
    Router,
    body::to_bytes,
    extract::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::warn;

use super::authorizer::{UserPoolAuthorizer, authorizer_middleware};
use super::functions::{AuthorizerContext, FunctionName, ProxyEvent};

const MAX_EVENT_BODY: usize = 1024 * 1024;

/// Create the local HTTP API router: `/public` open, `/private` behind the authorizer
pub fn create_router(authorizer: Arc<UserPoolAuthorizer>) -> Router {
    let private = Router::new()
        .route("/private", get(private_route))
        .route_layer(middleware::from_fn_with_state(
            authorizer,
            authorizer_middleware,
        ));

    Router::new()
        .route("/public", get(public_route))
        .merge(private)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn public_route(request: Request) -> Response {
    invoke(FunctionName::Public, request).await
}

async fn private_route(request: Request) -> Response {
    invoke(FunctionName::Private, request).await
}

/// Turn the request into a proxy event and run the function
async fn invoke(function: FunctionName, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();
    let authorizer = parts.extensions.remove::<AuthorizerContext>();

    let body = match to_bytes(body, MAX_EVENT_BODY).await {
        Ok(bytes) if bytes.is_empty() => None,
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!(function = %function, error = %e, "Failed to read request body");
            None
        }
    };

    let event = ProxyEvent::from_parts(&parts, body, authorizer);
    function.invoke(&event).into_response()
}
