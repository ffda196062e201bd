//! `POST /generate`: resolve a prompt through the tiered pipeline.
//!
//! Resolution failures are reported in the body with status 200; only a
//! malformed request body is rejected by the extractor.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, info_span, Instrument};

use crate::api::server::AppState;
use crate::config::ResponseShape;
use crate::providers::SamplingOverrides;
use crate::resolver::{Resolution, ResolutionSource};

/// Header naming the tier that produced the response.
pub const RESOLUTION_SOURCE_HEADER: &str = "x-resolution-source";

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub parameters: SamplingOverrides,
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateRequest>,
) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("generate", %request_id);

    // Resolve on a detached task so a client disconnect does not abort
    // in-flight retries; the cache still benefits from the result.
    let resolver = state.resolver.clone();
    let task = tokio::spawn(
        async move { resolver.resolve_with(&body.prompt, &body.parameters).await }
            .instrument(span),
    );

    let resolution = match task.await {
        Ok(resolution) => resolution,
        Err(e) => {
            error!(%request_id, "Resolution task failed: {e}");
            Resolution::new(ResolutionSource::Fallback, state.resolver.fallback())
        }
    };
    info!(%request_id, source = resolution.source.as_str(), "Request resolved");

    render(state.response_shape, resolution)
}

fn render(shape: ResponseShape, resolution: Resolution) -> Response {
    let body = match shape {
        ResponseShape::Envelope => json!({ "response": resolution.text }),
        ResponseShape::Bare => Value::String(resolution.text),
    };
    let mut response = (StatusCode::OK, Json(body)).into_response();
    response.headers_mut().insert(
        HeaderName::from_static(RESOLUTION_SOURCE_HEADER),
        HeaderValue::from_static(resolution.source.as_str()),
    );
    response
}
