//! Cognito Playground - hosted UI, password grant and JWT authorizer demos

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use cognito_playground::{
    api::{self, ApiState},
    cli::{Cli, Command, ServeArgs, StackKind, SynthArgs},
    cognito::{HostedUiClient, IdentityProviderClient, http_client},
    config::Config,
    gateway::{self, UserPoolAuthorizer},
    infra::{self, HttpApiStack, Stack, UserPoolStack},
    server, setup_tracing,
    web::{self, WebState},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env is fine; the values can come from anywhere else
    let dotenv = dotenvy::dotenv().ok();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    if let Some(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Web(args) => run_web(config, args).await,
        Command::Api(args) => run_api(config, args).await,
        Command::Gateway(args) => run_gateway(config, args).await,
        Command::Synth(args) => run_synth(&config, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the session web app
async fn run_web(config: Config, args: ServeArgs) -> cognito_playground::Result<()> {
    let settings = config.hosted_ui_settings()?;
    let http = http_client(config.http.timeout)?;
    let hosted_ui = HostedUiClient::new(http, settings)?;

    let state = WebState::new(hosted_ui, &config.web);
    let host = args.host.unwrap_or(config.web.host);
    let port = args.port.unwrap_or(config.web.port);

    server::serve(web::create_router(state), "web", &host, port).await
}

/// Run the password-grant API backend
async fn run_api(config: Config, args: ServeArgs) -> cognito_playground::Result<()> {
    let settings = config.idp_settings()?;
    let http = http_client(config.http.timeout)?;
    let state = ApiState::new(IdentityProviderClient::new(http, settings));

    let host = args.host.unwrap_or(config.api.host);
    let port = args.port.unwrap_or(config.api.port);

    server::serve(api::create_router(state), "api", &host, port).await
}

/// Run the local HTTP API
async fn run_gateway(config: Config, args: ServeArgs) -> cognito_playground::Result<()> {
    let authorizer = UserPoolAuthorizer::new(config.authorizer_settings()?);
    info!(issuer = %authorizer.issuer(), "Authorizer ready");

    let host = args.host.unwrap_or(config.gateway.host);
    let port = args.port.unwrap_or(config.gateway.port);

    server::serve(
        gateway::create_router(Arc::new(authorizer)),
        "gateway",
        &host,
        port,
    )
    .await
}

/// Write a CloudFormation template
fn run_synth(config: &Config, args: SynthArgs) -> cognito_playground::Result<()> {
    let stack: Box<dyn Stack> = match args.stack {
        StackKind::UserPool => Box::new(UserPoolStack::new(
            args.stack_name
                .unwrap_or_else(|| config.cognito.stack_name.clone()),
            args.domain_prefix,
        )),
        StackKind::HttpApi => {
            let user_pool_id = args
                .user_pool_id
                .or_else(|| config.cognito.user_pool_id.clone())
                .unwrap_or_default();
            let client_ids = if args.client_ids.is_empty() {
                config.cognito.client_id.iter().cloned().collect()
            } else {
                args.client_ids
            };
            Box::new(HttpApiStack::new(
                args.stack_name
                    .unwrap_or_else(|| "AwsLambdaStack".to_string()),
                user_pool_id,
                client_ids,
            )?)
        }
    };

    let path = infra::synth(stack.as_ref(), &args.out_dir, args.format)?;
    println!("{}", path.display());
    Ok(())
}
