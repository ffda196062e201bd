//! PromptGate binary entry point.

mod cli;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    cli::run(cli::Cli::parse()).await
}
