//! Hugging Face Inference API backend.
//!
//! Sends `POST {api_url}` with `Authorization: Bearer <token>` and the
//! [`InferenceRequest`] as JSON body. Status codes are mapped onto the
//! transient/permanent split used by the retry loop.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};

use super::{decode_generation, InferenceBackend, InferenceRequest, InferenceResult};

/// Base URL of the hosted inference API; the model id is appended.
pub const HF_API_BASE: &str = "https://api-inference.huggingface.co/models";

/// Longest provider error text carried into error messages.
const MAX_ERROR_CHARS: usize = 200;

/// Backend for the Hugging Face text-generation endpoint.
pub struct HuggingFaceBackend {
    api_url: String,
    token: Option<String>,
    client: Client,
}

impl std::fmt::Debug for HuggingFaceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceBackend")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HuggingFaceBackend {
    /// Build a backend. A missing token is accepted here and reported on the
    /// first call as [`ProviderError::MissingCredential`].
    pub fn new(
        api_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_url: api_url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.endpoint(),
            config.token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Hosted API URL for a model id.
    pub fn model_url(model: &str) -> String {
        format!("{}/{}", HF_API_BASE, model.trim_matches('/'))
    }
}

#[async_trait]
impl InferenceBackend for HuggingFaceBackend {
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResult, ProviderError> {
        let token = self
            .token
            .as_deref()
            .ok_or(ProviderError::MissingCredential)?;

        debug!(url = %self.api_url, "Sending inference request");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transient(format!("failed to read provider response: {e}")))?;

        if status.is_success() {
            return Ok(decode_generation(&body));
        }
        Err(classify_failure(status.as_u16(), &body))
    }
}

/// Error body returned by the inference API, e.g.
/// `{"error": "Model x is currently loading", "estimated_time": 20.0}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    estimated_time: Option<f64>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_builder() {
        ProviderError::permanent(None, format!("malformed provider request: {err}"))
    } else if err.is_timeout() {
        ProviderError::transient(format!("provider request timed out: {err}"))
    } else {
        ProviderError::transient(format!("provider request failed: {err}"))
    }
}

/// Map a non-2xx response onto the error taxonomy.
///
/// 5xx, 408 and 429 are transient. Any status whose body reports that the
/// model is loading is transient too, carrying `estimated_time` as the
/// suggested wait. Every other status is permanent.
pub(crate) fn classify_failure(status: u16, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(ErrorBody::message)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.to_string()
            }
        });
    let message: String = message.chars().take(MAX_ERROR_CHARS).collect();

    let retry_after = parsed
        .and_then(|p| p.estimated_time)
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX));
    let loading = retry_after.is_some() || message.to_lowercase().contains("loading");

    match status {
        408 | 429 | 500..=599 => ProviderError::Transient {
            message,
            retry_after,
        },
        _ if loading => ProviderError::Transient {
            message,
            retry_after,
        },
        _ => ProviderError::permanent(Some(status), message),
    }
}
