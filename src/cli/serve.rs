//! `serve` command handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use promptgate::api::{start_server, AppState};
use promptgate::config::Config;
use promptgate::prewarm::spawn_prewarm;
use promptgate::resolver::Resolver;

pub(crate) async fn cmd_serve(config: Config) -> Result<()> {
    if let Err(e) = config.require_credential() {
        warn!("{e}; provider calls will answer with an error until a token is set");
    }

    let resolver =
        Arc::new(Resolver::from_config(&config).context("failed to build inference backend")?);
    info!(
        endpoint = %config.provider.endpoint(),
        cache_policy = ?config.cache.policy,
        cache_capacity = config.cache.capacity,
        max_attempts = config.provider.max_attempts,
        retry_delay_ms = config.provider.retry_delay_ms,
        max_concurrent = config.provider.max_concurrent,
        response_shape = ?config.server.response_shape,
        "Resolver ready"
    );

    // Detached: serving starts immediately, warm entries land as they finish.
    let _ = spawn_prewarm(resolver.clone(), config.prewarm.clone());

    let state = AppState::new(resolver, config.server.response_shape);
    start_server(&config.server, state)
        .await
        .context("API server failed")
}
