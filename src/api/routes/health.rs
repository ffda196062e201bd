//! Health endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::api::server::AppState;

/// GET /health: liveness plus cache and provider limiter stats.
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0);
    let client = state.resolver.client();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime,
        "cache": state.resolver.cache().stats(),
        "provider": {
            "max_concurrent": client.max_concurrent(),
            "available_permits": client.available_permits(),
            "max_attempts": client.policy().max_attempts,
        },
    }))
}
