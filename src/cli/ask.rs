//! `ask` command handler.

use anyhow::{Context, Result};

use promptgate::config::Config;
use promptgate::resolver::Resolver;

/// One-shot resolution through the same pipeline the server uses.
pub(crate) async fn cmd_ask(config: Config, prompt: &str, verbose: bool) -> Result<()> {
    let resolver = Resolver::from_config(&config).context("failed to build inference backend")?;
    let resolution = resolver.resolve(prompt).await;
    if verbose {
        println!("[{}] {}", resolution.source.as_str(), resolution.text);
    } else {
        println!("{}", resolution.text);
    }
    Ok(())
}
