//! Inference providers.
//!
//! An [`InferenceBackend`] performs exactly one call to a text-generation
//! service. [`InferenceClient`] wraps a backend with the retry policy and the
//! bound on concurrent outbound calls.

pub mod client;
pub mod huggingface;
pub mod response;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use client::{InferenceClient, RetryPolicy, DEFAULT_MAX_CONCURRENT};
pub use huggingface::HuggingFaceBackend;
pub use response::{decode_generation, GenerationPayload, InferenceResult};

/// Sampling parameters sent to the provider as `parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub do_sample: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_length: Some(30),
            max_new_tokens: None,
            temperature: 0.7,
            top_k: 30,
            top_p: 0.9,
            do_sample: true,
        }
    }
}

impl SamplingConfig {
    /// Keep a single output-length limit. `max_new_tokens` wins over
    /// `max_length` when both are set.
    pub fn with_single_length_limit(mut self) -> Self {
        if self.max_new_tokens.is_some() {
            self.max_length = None;
        }
        self
    }
}

/// Per-request sampling overrides supplied by the caller.
///
/// Absent fields keep the configured default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOverrides {
    pub max_length: Option<u32>,
    pub max_new_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
    pub top_p: Option<f64>,
    pub do_sample: Option<bool>,
}

impl SamplingOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto `base`, returning the effective configuration.
    ///
    /// A length limit given here replaces the base limit of either kind.
    pub fn apply(&self, base: &SamplingConfig) -> SamplingConfig {
        let (max_length, max_new_tokens) = match (self.max_length, self.max_new_tokens) {
            (None, None) => (base.max_length, base.max_new_tokens),
            (length, new_tokens) => (length, new_tokens),
        };
        SamplingConfig {
            max_length,
            max_new_tokens,
            temperature: self.temperature.unwrap_or(base.temperature),
            top_k: self.top_k.unwrap_or(base.top_k),
            top_p: self.top_p.unwrap_or(base.top_p),
            do_sample: self.do_sample.unwrap_or(base.do_sample),
        }
        .with_single_length_limit()
    }
}

/// Payload of a single provider call: `{"inputs": ..., "parameters": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub inputs: String,
    pub parameters: SamplingConfig,
}

impl InferenceRequest {
    pub fn new(inputs: impl Into<String>, parameters: SamplingConfig) -> Self {
        Self {
            inputs: inputs.into(),
            parameters,
        }
    }
}

/// One attempt against a text-generation service. Implementations must not
/// retry; that is the job of [`InferenceClient`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResult, ProviderError>;
}
