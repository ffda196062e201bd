//! Retrying inference client.
//!
//! Transient failures are retried with a fixed delay up to `max_attempts`
//! total attempts. A provider-suggested wait (model warm-up) replaces the fixed
//! delay, capped at `max_estimated_wait`. Permanent failures and empty results
//! are returned immediately. Each attempt holds a permit from a shared
//! semaphore, so the number of concurrent outbound calls stays bounded while
//! sleeping requests hold nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

use super::{InferenceBackend, InferenceRequest, InferenceResult, SamplingConfig};

/// Default bound on concurrent outbound provider calls.
pub const DEFAULT_MAX_CONCURRENT: usize = 20;

/// Bounded retry with a fixed inter-attempt delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
    /// Upper bound for a provider-suggested wait.
    pub max_estimated_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
            max_estimated_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: Duration::from_millis(config.retry_delay_ms),
            max_estimated_wait: Duration::from_secs(config.max_estimated_wait_secs),
        }
    }

    /// Delay before the attempt following `err`.
    pub fn delay_for(&self, err: &ProviderError) -> Duration {
        match err {
            ProviderError::Transient {
                retry_after: Some(wait),
                ..
            } => (*wait).min(self.max_estimated_wait),
            _ => self.delay,
        }
    }
}

/// Inference client shared by all request tasks.
pub struct InferenceClient {
    backend: Arc<dyn InferenceBackend>,
    policy: RetryPolicy,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl InferenceClient {
    pub fn new(backend: Arc<dyn InferenceBackend>, policy: RetryPolicy, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            backend,
            policy,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Permits currently free for outbound calls.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Generate text for `prompt`.
    ///
    /// Errors:
    /// - `Exhausted` once every attempt failed transiently
    /// - `Permanent` / `MissingCredential` straight from the first such failure
    /// - `EmptyResult` when the provider answered without usable text
    pub async fn fetch(&self, prompt: &str, sampling: &SamplingConfig) -> Result<String, ProviderError> {
        let request = InferenceRequest::new(prompt, sampling.clone());
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.attempt(&request).await {
                Ok(InferenceResult::Text(text)) => {
                    if attempt > 1 {
                        info!(attempt, "Provider call succeeded after retry");
                    }
                    return Ok(text);
                }
                Ok(InferenceResult::NoContent) => {
                    warn!(attempt, "Provider returned no usable text");
                    return Err(ProviderError::EmptyResult);
                }
                Err(err) if err.is_transient() => {
                    if attempt >= max_attempts {
                        warn!(attempt, error = %err, "Provider retries exhausted");
                        return Err(ProviderError::Exhausted {
                            attempts: attempt,
                            last: err.to_string(),
                        });
                    }
                    let delay = self.policy.delay_for(&err);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Provider call failed permanently");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, request: &InferenceRequest) -> Result<InferenceResult, ProviderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ProviderError::transient(format!("outbound limiter closed: {e}")))?;
        debug!(
            in_flight = self.max_concurrent - self.permits.available_permits(),
            "Calling provider"
        );
        self.backend.generate(request).await
    }
}
