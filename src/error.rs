//! Error types for PromptGate.
//!
//! `ConfigError` covers everything that can go wrong before the first request
//! is served. `ProviderError` is the taxonomy of the inference call; the
//! resolver turns every variant into a textual response, so none of these
//! ever reach the HTTP layer as a status code.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("no provider credential configured (set HUGGINGFACE_TOKEN)")]
    MissingCredential,
}

/// Response cache failures. Never fatal to a request.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("response cache lock poisoned")]
    LockPoisoned,
}

/// Coarse classification of a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Worth retrying: network error, 5xx, model loading.
    Transient,
    /// Never retried: bad request, auth failure, missing credential.
    Permanent,
    /// All attempts used up on transient failures.
    Exhausted,
    /// The provider answered but produced no usable text.
    Empty,
}

/// Failure of an inference call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("no provider credential configured")]
    MissingCredential,

    #[error("transient provider failure: {message}")]
    Transient {
        message: String,
        /// Provider-suggested wait before the next attempt (model warm-up).
        retry_after: Option<Duration>,
    },

    #[error("provider rejected the request{}: {message}", status_suffix(.status))]
    Permanent { status: Option<u16>, message: String },

    #[error("provider unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("provider returned no usable text")]
    EmptyResult,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn permanent(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Permanent {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Transient { .. } => ProviderErrorKind::Transient,
            Self::MissingCredential | Self::Permanent { .. } => ProviderErrorKind::Permanent,
            Self::Exhausted { .. } => ProviderErrorKind::Exhausted,
            Self::EmptyResult => ProviderErrorKind::Empty,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ProviderErrorKind::Transient
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum PromptGateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PromptGateError>;
