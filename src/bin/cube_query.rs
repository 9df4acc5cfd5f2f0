//! cube-query - run describe and query calls against a Cube-style backend.
//!
//! Credentials come from flags or the environment (`CUBE_ENDPOINT`,
//! `CUBE_API_SECRET`, `CUBE_TOKEN_PAYLOAD`); a `.env` file in the working
//! directory is loaded first.
//!
//! ```text
//! cube-query describe
//! cube-query --claim tenant_id=acme query '{"measures":["Orders.count"]}'
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cubelink::auth::{parse_claim, Credentials, API_SECRET_ENV, ENDPOINT_ENV, TOKEN_PAYLOAD_ENV};
use cubelink::client::{BackendClient, ErrorPayload, SchemaSummary};

/// Query a Cube-style analytics backend.
#[derive(Parser, Debug)]
#[command(name = "cube-query")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Backend base URL (e.g., https://cube.example.com/cubejs-api/v1)
    #[arg(long, env = ENDPOINT_ENV, value_name = "URL")]
    endpoint: String,

    /// Shared secret used to sign tokens
    #[arg(long, env = API_SECRET_ENV, value_name = "SECRET", hide_env_values = true)]
    api_secret: String,

    /// Token claims as a JSON object
    #[arg(long, env = TOKEN_PAYLOAD_ENV, value_name = "JSON", default_value = "{}")]
    token_payload: String,

    /// Extra claim, merged over the token payload (repeatable)
    #[arg(long = "claim", value_name = "KEY[=VALUE]")]
    claims: Vec<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cubes, measures and dimensions the backend exposes
    Describe {
        /// Print the backend's description unmodified
        #[arg(long)]
        raw: bool,
    },
    /// Run a query given as JSON
    Query {
        /// Query object, e.g. '{"measures":["Orders.count"]}'
        #[arg(value_name = "JSON")]
        query: String,

        /// Keep numeric cells as the backend sent them
        #[arg(long)]
        no_cast: bool,
    },
}

fn main() {
    // A missing .env is fine; anything else in it is worth knowing about.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    if let Err(err) = dotenv {
        if !err.not_found() {
            error!(error = %err, "Failed to load .env");
        }
    }

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    }
}

/// Returns whether the printed payload was free of backend errors.
fn run(cli: Cli) -> Result<bool> {
    let claims = cli
        .claims
        .iter()
        .map(|arg| parse_claim(arg))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid --claim")?;

    let credentials = Credentials::from_payload_json(cli.endpoint, cli.api_secret, &cli.token_payload)
        .context("invalid token payload")?
        .with_claims(claims);

    info!(endpoint = credentials.base_url(), "Connecting");
    let mut client = BackendClient::new(credentials)?;

    let payload = match cli.command {
        Command::Describe { raw: true } => client.schema().clone(),
        Command::Describe { raw: false } => match SchemaSummary::from_meta(client.schema()) {
            Ok(summary) => serde_json::to_value(summary)?,
            Err(_) => client.schema().clone(),
        },
        Command::Query { query, no_cast } => {
            let query: Box<RawValue> =
                serde_json::from_str(&query).context("query is not valid JSON")?;
            client.query_with(&query, !no_cast)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(!has_error(&payload))
}

fn has_error(payload: &Value) -> bool {
    ErrorPayload::from_response(payload).is_some()
}
