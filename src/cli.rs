//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::infra::TemplateFormat;

/// Cognito Playground - hosted UI, password grant and JWT authorizer demos
#[derive(Parser, Debug)]
#[command(name = "cognito-playground")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "COGNITO_PLAYGROUND_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "COGNITO_PLAYGROUND_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "COGNITO_PLAYGROUND_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the session web app (authorization-code grant)
    Web(ServeArgs),

    /// Run the API backend (password grant)
    Api(ServeArgs),

    /// Run the local HTTP API with the user-pool authorizer
    Gateway(ServeArgs),

    /// Write CloudFormation templates
    Synth(SynthArgs),
}

/// Bind overrides for the server subcommands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Which stack to synthesize
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StackKind {
    /// User pool, hosted UI and app client
    UserPool,
    /// HTTP API with the JWT authorizer
    HttpApi,
}

/// Arguments of `synth`
#[derive(clap::Args, Debug, Clone)]
pub struct SynthArgs {
    /// Stack to synthesize
    #[arg(value_enum)]
    pub stack: StackKind,

    /// Output directory
    #[arg(short, long, default_value = "cdk.out")]
    pub out_dir: PathBuf,

    /// Template format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: TemplateFormat,

    /// Stack name (defaults to `CognitoPlaygroundStack` / `AwsLambdaStack`)
    #[arg(long)]
    pub stack_name: Option<String>,

    /// Hosted UI domain prefix (user-pool stack)
    #[arg(long, default_value = "cognito-playground")]
    pub domain_prefix: String,

    /// User pool the authorizer trusts (HTTP API stack; defaults to `cognito.user_pool_id`)
    #[arg(long)]
    pub user_pool_id: Option<String>,

    /// App clients the authorizer trusts (HTTP API stack; defaults to `cognito.client_id`)
    #[arg(long = "client-id")]
    pub client_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_subcommands() {
        let cli = Cli::parse_from(["cognito-playground", "web", "--port", "4000"]);
        match cli.command {
            Command::Web(args) => assert_eq!(args.port, Some(4000)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn parses_synth_arguments() {
        let cli = Cli::parse_from([
            "cognito-playground",
            "synth",
            "http-api",
            "--format",
            "yaml",
            "--user-pool-id",
            "us-east-1_abc",
            "--client-id",
            "one",
            "--client-id",
            "two",
        ]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.stack, StackKind::HttpApi);
        assert_eq!(args.format, TemplateFormat::Yaml);
        assert_eq!(args.client_ids, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(args.out_dir, PathBuf::from("cdk.out"));
    }

    #[test]
    fn synth_takes_the_stack_positionally() {
        let cli = Cli::parse_from(["cognito-playground", "synth", "user-pool"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.stack, StackKind::UserPool);
        assert_eq!(args.format, TemplateFormat::Json);
        assert_eq!(args.domain_prefix, "cognito-playground");

        assert!(Cli::try_parse_from(["cognito-playground", "synth", "--stack", "user-pool"]).is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from(["cognito-playground", "api", "--log-format", "json"]);
        assert_eq!(cli.log_format.as_deref(), Some("json"));
    }
}
