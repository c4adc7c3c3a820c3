//! Serverless function pair and the HTTP API that fronts it
//!
//! `functions` holds the two handlers the deployed stack runs, `authorizer`
//! reproduces the user-pool JWT authorizer, and `routes` wires both into a
//! local HTTP API so the pair can be exercised without deploying. `lambda`
//! runs one of the pair under the Lambda runtime.

pub mod authorizer;
pub mod functions;
pub mod lambda;
mod routes;

pub use authorizer::{AuthorizerError, UserPoolAuthorizer};
pub use functions::{FunctionName, HANDLER_ENV, ProxyEvent, ProxyResponse, private_handler, public_handler};
pub use routes::create_router;
