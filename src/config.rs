//! Configuration for PromptGate.
//!
//! Loaded from `~/.promptgate/config.toml` (or `--config`), then overridden
//! by environment variables. A missing default file means built-in defaults.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::{CachePolicy, DEFAULT_CACHE_CAPACITY};
use crate::error::ConfigError;
use crate::providers::huggingface::HuggingFaceBackend;
use crate::providers::{SamplingConfig, DEFAULT_MAX_CONCURRENT};

/// Text returned when inference cannot be completed.
pub const DEFAULT_FALLBACK_RESPONSE: &str = "Errore nel generare la risposta dal modello esterno.";

const DEFAULT_MODEL: &str = "gpt2";

/// Shape of the `POST /generate` response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    /// `{"response": "..."}`
    #[default]
    Envelope,
    /// `"..."`
    Bare,
}

impl FromStr for ResponseShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "envelope" => Ok(Self::Envelope),
            "bare" => Ok(Self::Bare),
            other => Err(format!("unknown response shape '{other}'")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub response_shape: ResponseShape,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            response_shape: ResponseShape::Envelope,
        }
    }
}

/// Inference provider settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Full endpoint URL. When unset, derived from `model`.
    pub api_url: Option<String>,
    pub model: String,
    pub token: Option<String>,
    /// Per-attempt HTTP timeout.
    pub timeout_secs: u64,
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Cap on a provider-suggested warm-up wait.
    pub max_estimated_wait_secs: u64,
    /// Bound on concurrent outbound calls.
    pub max_concurrent: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            model: DEFAULT_MODEL.to_string(),
            token: None,
            timeout_secs: 30,
            max_attempts: 3,
            retry_delay_ms: 2_000,
            max_estimated_wait_secs: 60,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("max_estimated_wait_secs", &self.max_estimated_wait_secs)
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

impl ProviderConfig {
    /// Endpoint the backend posts to.
    pub fn endpoint(&self) -> String {
        match self.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => HuggingFaceBackend::model_url(&self.model),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub policy: CachePolicy,
    /// Only used by the LRU policy.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            policy: CachePolicy::Lru,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub sampling: SamplingConfig,
    pub cache: CacheConfig,
    /// Extra static answers, merged over the built-in table.
    pub answers: BTreeMap<String, String>,
    pub fallback_response: String,
    /// Prompts resolved in the background at startup to warm the cache.
    pub prewarm: Vec<String>,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            sampling: SamplingConfig::default(),
            cache: CacheConfig::default(),
            answers: BTreeMap::new(),
            fallback_response: DEFAULT_FALLBACK_RESPONSE.to_string(),
            prewarm: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Default config file location: `~/.promptgate/config.toml`.
    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".promptgate")
            .join("config.toml")
    }

    /// Parse a TOML config file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&data)?;
        config.sampling = config.sampling.with_single_length_limit();
        Ok(config)
    }

    /// Load file (explicit path must exist; the default path may be absent),
    /// apply process environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::load_from_path(p)?,
            None => {
                let default_path = Self::path();
                if default_path.exists() {
                    Self::load_from_path(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some((_, token)) =
            first_set(&lookup, &["PROMPTGATE_PROVIDER_TOKEN", "HUGGINGFACE_TOKEN"])
        {
            self.provider.token = Some(token.trim().to_string());
        }
        if let Some((_, model)) = first_set(&lookup, &["PROMPTGATE_MODEL"]) {
            self.provider.model = model.trim().to_string();
        }
        if let Some((_, url)) =
            first_set(&lookup, &["PROMPTGATE_API_URL", "HUGGINGFACE_API_URL"])
        {
            self.provider.api_url = Some(url.trim().to_string());
        }
        if let Some((name, v)) = first_set(&lookup, &["PROMPTGATE_TIMEOUT_SECS"]) {
            self.provider.timeout_secs = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first_set(&lookup, &["PROMPTGATE_MAX_ATTEMPTS"]) {
            self.provider.max_attempts = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first_set(&lookup, &["PROMPTGATE_RETRY_DELAY_MS"]) {
            self.provider.retry_delay_ms = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first_set(&lookup, &["PROMPTGATE_MAX_CONCURRENT"]) {
            self.provider.max_concurrent = parse_env(name, &v)?;
        }
        if let Some((_, v)) = first_set(&lookup, &["PROMPTGATE_BIND"]) {
            self.server.bind = v.trim().to_string();
        }
        if let Some((name, v)) = first_set(&lookup, &["PROMPTGATE_PORT", "PORT"]) {
            self.server.port = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first_set(&lookup, &["PROMPTGATE_RESPONSE_SHAPE"]) {
            self.server.response_shape = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first_set(&lookup, &["PROMPTGATE_CACHE_POLICY"]) {
            self.cache.policy = parse_env(name, &v)?;
        }
        if let Some((name, v)) = first_set(&lookup, &["PROMPTGATE_CACHE_CAPACITY"]) {
            self.cache.capacity = parse_env(name, &v)?;
        }
        if let Some((_, v)) = first_set(&lookup, &["PROMPTGATE_LOG_LEVEL"]) {
            self.logging.level = v.trim().to_string();
        }
        if let Some((name, v)) = first_set(&lookup, &["PROMPTGATE_LOG_FORMAT"]) {
            self.logging.format = parse_env(name, &v)?;
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "provider.timeout_secs must be at least 1".into(),
            ));
        }
        if self.provider.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "provider.max_attempts must be at least 1".into(),
            ));
        }
        if self.provider.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "provider.max_concurrent must be at least 1".into(),
            ));
        }
        if self.cache.policy == CachePolicy::Lru && self.cache.capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.capacity must be at least 1 for the lru policy".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sampling.top_p) {
            return Err(ConfigError::Invalid(
                "sampling.top_p must be between 0 and 1".into(),
            ));
        }
        if !self.sampling.temperature.is_finite() || self.sampling.temperature < 0.0 {
            return Err(ConfigError::Invalid(
                "sampling.temperature must be a non-negative number".into(),
            ));
        }
        if self.fallback_response.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "fallback_response must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Provider token, or `MissingCredential`.
    pub fn require_credential(&self) -> Result<&str, ConfigError> {
        self.provider
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingCredential)
    }
}

/// First non-blank variable among `names`, with the name it was read from.
fn first_set<F>(lookup: &F, names: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|&name| {
        lookup(name)
            .filter(|v| !v.trim().is_empty())
            .map(|v| (name, v))
    })
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{name}={value:?}: {e}")))
}
