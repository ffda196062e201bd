//! Decoding of provider response bodies.
//!
//! Text-generation endpoints answer either with a single object
//! `{"generated_text": "..."}` or with a list of such objects. Both shapes are
//! decoded here into one [`InferenceResult`]; anything else counts as no
//! content rather than a transport failure.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Generation {
    #[serde(default)]
    pub generated_text: Option<String>,
}

/// Raw response shapes accepted from the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GenerationPayload {
    Batch(Vec<Generation>),
    Single(Generation),
}

/// Canonical outcome of a successful provider round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceResult {
    Text(String),
    NoContent,
}

impl GenerationPayload {
    /// Collapse to one result. For a batch the first candidate is used.
    pub fn into_result(self) -> InferenceResult {
        let text = match self {
            Self::Single(generation) => generation.generated_text,
            Self::Batch(generations) => generations
                .into_iter()
                .next()
                .and_then(|g| g.generated_text),
        };
        match text {
            Some(t) if !t.trim().is_empty() => InferenceResult::Text(t),
            _ => InferenceResult::NoContent,
        }
    }
}

/// Decode a 2xx response body.
pub fn decode_generation(body: &str) -> InferenceResult {
    match serde_json::from_str::<GenerationPayload>(body) {
        Ok(payload) => payload.into_result(),
        Err(_) => InferenceResult::NoContent,
    }
}
