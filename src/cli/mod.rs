//! Command-line interface.

mod ask;
mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use promptgate::config::{Config, LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "promptgate",
    version,
    about = "Text-generation broker: static answers, response cache, retrying inference"
)]
pub(crate) struct Cli {
    /// Config file (default: ~/.promptgate/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Bind address, overrides config and environment
        #[arg(long)]
        bind: Option<String>,
        /// Listen port, overrides config and environment
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Resolve a single prompt and print the response
    Ask {
        prompt: String,
        /// Also print which tier answered
        #[arg(short, long)]
        verbose: bool,
    },
}

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_logging(&config.logging);

    match cli.command.unwrap_or(Commands::Serve {
        bind: None,
        port: None,
    }) {
        Commands::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve::cmd_serve(config).await
        }
        Commands::Ask { prompt, verbose } => ask::cmd_ask(config, &prompt, verbose).await,
    }
}

/// Install the global tracing subscriber. Logs go to stderr so `ask` output
/// on stdout stays clean.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("logging already initialised: {e}");
    }
}
