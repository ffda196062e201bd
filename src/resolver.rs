//! Request resolution pipeline.
//!
//! ```text
//! CHECK_STATIC ─hit─▶ RESPOND
//!      │ miss
//! CHECK_CACHE ──hit─▶ RESPOND
//!      │ miss
//! CALL_PROVIDER ─exhausted/empty─▶ RESPOND(fallback)
//!      │        ─permanent──────▶ RESPOND(error text)
//! SANITIZE ─▶ WRITE_CACHE ─▶ RESPOND
//! ```
//!
//! Every path ends in a [`Resolution`]; failures are expressed as text, never
//! as an error the HTTP layer has to map.
//!
//! Two concurrent misses for the same key each call the provider and the last
//! `put` wins. There is no per-key request coalescing.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::answers::StaticAnswers;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::{ConfigError, ProviderError};
use crate::providers::{
    HuggingFaceBackend, InferenceBackend, InferenceClient, RetryPolicy, SamplingConfig,
    SamplingOverrides,
};
use crate::utils::{canonicalize, sanitize_output};

/// Reply for a prompt that is blank after trimming.
pub const EMPTY_PROMPT_RESPONSE: &str = "Il prompt è vuoto: scrivi una domanda.";

/// Which tier produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Static,
    Cache,
    Provider,
    Fallback,
    Error,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Cache => "cache",
            Self::Provider => "provider",
            Self::Fallback => "fallback",
            Self::Error => "error",
        }
    }
}

/// Final outcome of resolving one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub source: ResolutionSource,
    pub text: String,
}

impl Resolution {
    pub fn new(source: ResolutionSource, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }
}

/// Resolution context: static table, cache and inference client.
///
/// Constructed once and shared behind an `Arc` by every request task.
pub struct Resolver {
    answers: StaticAnswers,
    cache: ResponseCache,
    client: InferenceClient,
    sampling: SamplingConfig,
    fallback: String,
}

impl Resolver {
    pub fn new(
        answers: StaticAnswers,
        cache: ResponseCache,
        client: InferenceClient,
        sampling: SamplingConfig,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            answers,
            cache,
            client,
            sampling,
            fallback: fallback.into(),
        }
    }

    /// Build the full pipeline from configuration with the Hugging Face backend.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let backend = HuggingFaceBackend::from_config(&config.provider)?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Build the pipeline from configuration around an arbitrary backend.
    pub fn with_backend(config: &Config, backend: Arc<dyn InferenceBackend>) -> Self {
        let client = InferenceClient::new(
            backend,
            RetryPolicy::from_config(&config.provider),
            config.provider.max_concurrent,
        );
        Self::new(
            StaticAnswers::with_extra(config.answers.clone()),
            ResponseCache::new(config.cache.policy, config.cache.capacity),
            client,
            config.sampling.clone(),
            config.fallback_response.clone(),
        )
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Resolve with the configured sampling parameters.
    pub async fn resolve(&self, prompt: &str) -> Resolution {
        self.resolve_with(prompt, &SamplingOverrides::default())
            .await
    }

    /// Resolve with caller-supplied sampling overrides.
    pub async fn resolve_with(&self, prompt: &str, overrides: &SamplingOverrides) -> Resolution {
        let key = canonicalize(prompt);
        if key.is_empty() {
            debug!("Blank prompt, nothing to resolve");
            return Resolution::new(ResolutionSource::Error, EMPTY_PROMPT_RESPONSE);
        }

        if let Some(answer) = self.answers.lookup(&key) {
            debug!(key = %key, "Static answer hit");
            return Resolution::new(ResolutionSource::Static, answer);
        }

        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key, "Response cache hit");
            return Resolution::new(ResolutionSource::Cache, cached);
        }

        let sampling = overrides.apply(&self.sampling);
        let raw = match self.client.fetch(&key, &sampling).await {
            Ok(raw) => raw,
            Err(err) => return self.failure(&key, err),
        };

        let text = sanitize_output(prompt, &raw);
        if text.is_empty() {
            return self.failure(&key, ProviderError::EmptyResult);
        }

        if let Err(e) = self.cache.put(key.clone(), text.clone()) {
            warn!(key = %key, error = %e, "Failed to write response cache");
        }
        info!(key = %key, chars = text.chars().count(), "Generated response");
        Resolution::new(ResolutionSource::Provider, text)
    }

    fn failure(&self, key: &str, err: ProviderError) -> Resolution {
        match err {
            ProviderError::Exhausted { .. } | ProviderError::EmptyResult => {
                warn!(key = %key, error = %err, "Serving fallback response");
                Resolution::new(ResolutionSource::Fallback, self.fallback.as_str())
            }
            ProviderError::MissingCredential
            | ProviderError::Permanent { .. }
            | ProviderError::Transient { .. } => {
                warn!(key = %key, error = %err, "Provider call failed");
                Resolution::new(
                    ResolutionSource::Error,
                    format!("Errore nel generare la risposta: {err}"),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::providers::{InferenceRequest, InferenceResult, MockInferenceBackend};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn resolver_with(mock: MockInferenceBackend, cache: ResponseCache) -> Resolver {
        resolver_from(Arc::new(mock), cache)
    }

    fn resolver_from(backend: Arc<dyn InferenceBackend>, cache: ResponseCache) -> Resolver {
        let client = InferenceClient::new(
            backend,
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_millis(5),
                max_estimated_wait: Duration::from_millis(50),
            },
            4,
        );
        Resolver::new(
            StaticAnswers::builtin(),
            cache,
            client,
            SamplingConfig::default(),
            "fallback text",
        )
    }

    #[tokio::test]
    async fn test_static_hit_skips_provider() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().never();
        let resolver = resolver_with(mock, ResponseCache::lru(10));

        let res = resolver.resolve("  Ciao ").await;
        assert_eq!(res.source, ResolutionSource::Static);
        assert_eq!(res.text, "Ciao! Come posso aiutarti oggi?");
        assert!(resolver.cache().is_empty(), "static hits are not cached");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().never();
        let cache = ResponseCache::lru(10);
        cache
            .put("raccontami una barzelletta".into(), "cached joke".into())
            .unwrap();
        let resolver = resolver_with(mock, cache);

        let res = resolver.resolve("Raccontami una barzelletta").await;
        assert_eq!(res.source, ResolutionSource::Cache);
        assert_eq!(res.text, "cached joke");
    }

    #[tokio::test]
    async fn test_static_table_wins_over_cache() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().never();
        let cache = ResponseCache::lru(10);
        cache.put("ciao".into(), "stale".into()).unwrap();
        let resolver = resolver_with(mock, cache);

        let res = resolver.resolve("ciao").await;
        assert_eq!(res.source, ResolutionSource::Static);
    }

    #[tokio::test]
    async fn test_provider_result_sanitized_cached_and_reused() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().times(1).returning(|req| {
            assert_eq!(req.inputs, "tell me a joke");
            Ok(InferenceResult::Text(
                "Tell me a joke\nWhy did the chicken cross the road?".into(),
            ))
        });
        let resolver = resolver_with(mock, ResponseCache::lru(10));

        let first = resolver.resolve("Tell me a joke").await;
        assert_eq!(first.source, ResolutionSource::Provider);
        assert_eq!(first.text, "Why did the chicken cross the road?");
        assert_eq!(
            resolver.cache().get("tell me a joke").as_deref(),
            Some("Why did the chicken cross the road?")
        );

        let second = resolver.resolve("TELL ME A JOKE  ").await;
        assert_eq!(second.source, ResolutionSource::Cache);
        assert_eq!(second.text, first.text);
    }

    #[tokio::test]
    async fn test_exhausted_returns_fallback_and_caches_nothing() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(3)
            .returning(|_| Err(ProviderError::transient("HTTP 503")));
        let resolver = resolver_with(mock, ResponseCache::lru(10));

        let res = resolver.resolve("qualcosa di nuovo").await;
        assert_eq!(res.source, ResolutionSource::Fallback);
        assert_eq!(res.text, "fallback text");
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_empty_result_returns_fallback() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(InferenceResult::NoContent));
        let resolver = resolver_with(mock, ResponseCache::lru(10));

        let res = resolver.resolve("domanda").await;
        assert_eq!(res.source, ResolutionSource::Fallback);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_output_that_only_echoes_prompt_is_fallback() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(InferenceResult::Text("Domanda?\n".into())));
        let resolver = resolver_with(mock, ResponseCache::lru(10));

        let res = resolver.resolve("domanda?").await;
        assert_eq!(res.source, ResolutionSource::Fallback);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_failure_is_descriptive_text() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Err(ProviderError::permanent(Some(400), "Input validation error")));
        let resolver = resolver_with(mock, ResponseCache::lru(10));

        let res = resolver.resolve("domanda").await;
        assert_eq!(res.source, ResolutionSource::Error);
        assert!(res.text.starts_with("Errore nel generare la risposta:"));
        assert!(res.text.contains("Input validation error"));
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_is_descriptive_text() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Err(ProviderError::MissingCredential));
        let resolver = resolver_with(mock, ResponseCache::lru(10));

        let res = resolver.resolve("domanda").await;
        assert_eq!(res.source, ResolutionSource::Error);
        assert!(res.text.contains("credential"));
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_delivers_response() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(2)
            .returning(|_| Ok(InferenceResult::Text("Domanda nuova\nrisposta fresca".into())));
        let resolver = resolver_with(mock, ResponseCache::lru(10));
        resolver.cache().poison();

        let res = resolver.resolve("Domanda nuova").await;
        assert_eq!(res.source, ResolutionSource::Provider);
        assert_eq!(res.text, "risposta fresca");
        assert!(resolver.cache().get("domanda nuova").is_none());

        // Nothing was cached, so the next call goes to the provider again.
        let again = resolver.resolve("domanda nuova").await;
        assert_eq!(again.source, ResolutionSource::Provider);
    }

    #[tokio::test]
    async fn test_blank_prompt_touches_nothing() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().never();
        let resolver = resolver_with(mock, ResponseCache::lru(10));

        let res = resolver.resolve(" \n\t ").await;
        assert_eq!(res.source, ResolutionSource::Error);
        assert_eq!(res.text, EMPTY_PROMPT_RESPONSE);
        assert_eq!(resolver.cache().stats().misses, 0);
    }

    #[tokio::test]
    async fn test_overrides_reach_provider() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().times(1).returning(|req| {
            assert_eq!(req.parameters.temperature, 0.1);
            assert_eq!(req.parameters.top_k, 30);
            Ok(InferenceResult::Text("risposta".into()))
        });
        let resolver = resolver_with(mock, ResponseCache::lru(10));

        let overrides = SamplingOverrides {
            temperature: Some(0.1),
            ..SamplingOverrides::default()
        };
        let res = resolver.resolve_with("domanda", &overrides).await;
        assert_eq!(res.text, "risposta");
    }

    /// Counts calls and stalls so concurrent misses overlap.
    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceBackend for CountingBackend {
        async fn generate(
            &self,
            _request: &InferenceRequest,
        ) -> Result<InferenceResult, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(InferenceResult::Text(format!("answer {n}")))
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_may_each_call_provider() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
        });
        let resolver = Arc::new(resolver_from(backend.clone(), ResponseCache::lru(10)));

        let (a, b) = tokio::join!(
            resolver.resolve("stessa domanda"),
            resolver.resolve("Stessa domanda")
        );

        assert_eq!(a.source, ResolutionSource::Provider);
        assert_eq!(b.source, ResolutionSource::Provider);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        // Whichever write landed last is what the cache now serves.
        let cached = resolver.cache().get("stessa domanda").unwrap();
        assert!(cached == a.text || cached == b.text);
        assert_eq!(resolver.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_lru_cache_policy_evicts_through_resolver() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
        });
        let resolver = resolver_from(backend.clone(), ResponseCache::new(CachePolicy::Lru, 1));

        resolver.resolve("prima").await;
        resolver.resolve("seconda").await;
        let again = resolver.resolve("prima").await;

        assert_eq!(again.source, ResolutionSource::Provider);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(ResolutionSource::Static.as_str(), "static");
        assert_eq!(ResolutionSource::Fallback.as_str(), "fallback");
        assert_eq!(
            serde_json::to_string(&ResolutionSource::Cache).unwrap(),
            r#""cache""#
        );
    }
}
