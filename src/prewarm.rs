//! Background cache pre-warming.
//!
//! Resolves a list of known prompts through the normal pipeline so their
//! answers are cached before real traffic asks for them. Runs on its own task
//! and never blocks request handling; outbound calls share the client's
//! concurrency bound with live requests.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::resolver::{ResolutionSource, Resolver};

/// Outcome counts of a pre-warm run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrewarmReport {
    /// Prompts newly generated and cached.
    pub generated: usize,
    /// Prompts already answered by the static table or the cache.
    pub skipped: usize,
    /// Prompts that ended in a fallback or error response.
    pub failed: usize,
}

/// Resolve every prompt concurrently and tally the outcomes.
pub async fn prewarm(resolver: &Resolver, prompts: &[String]) -> PrewarmReport {
    let resolutions =
        futures::future::join_all(prompts.iter().map(|p| resolver.resolve(p))).await;

    let mut report = PrewarmReport::default();
    for resolution in resolutions {
        match resolution.source {
            ResolutionSource::Provider => report.generated += 1,
            ResolutionSource::Static | ResolutionSource::Cache => report.skipped += 1,
            ResolutionSource::Fallback | ResolutionSource::Error => report.failed += 1,
        }
    }
    report
}

/// Spawn [`prewarm`] on the runtime. Returns `None` when there is nothing to do.
pub fn spawn_prewarm(resolver: Arc<Resolver>, prompts: Vec<String>) -> Option<JoinHandle<PrewarmReport>> {
    if prompts.is_empty() {
        return None;
    }
    Some(tokio::spawn(async move {
        info!(prompts = prompts.len(), "Pre-warming response cache");
        let report = prewarm(&resolver, &prompts).await;
        info!(
            generated = report.generated,
            skipped = report.skipped,
            failed = report.failed,
            "Cache pre-warm finished"
        );
        report
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ProviderError;
    use crate::providers::{InferenceResult, MockInferenceBackend};

    fn resolver(mock: MockInferenceBackend) -> Arc<Resolver> {
        let mut config = Config::default();
        config.provider.retry_delay_ms = 1;
        config.provider.max_attempts = 1;
        Arc::new(Resolver::with_backend(&config, Arc::new(mock)))
    }

    #[tokio::test]
    async fn test_prewarm_populates_cache() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().times(2).returning(|req| {
            if req.inputs == "fallisce" {
                Err(ProviderError::transient("down"))
            } else {
                Ok(InferenceResult::Text(format!("risposta a {}", req.inputs)))
            }
        });
        let resolver = resolver(mock);

        let prompts = vec!["Che tempo fa".to_string(), "ciao".to_string(), "fallisce".to_string()];
        let report = prewarm(&resolver, &prompts).await;

        assert_eq!(
            report,
            PrewarmReport {
                generated: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(
            resolver.cache().get("che tempo fa").as_deref(),
            Some("risposta a che tempo fa")
        );
    }

    #[tokio::test]
    async fn test_spawn_prewarm_runs_in_background() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(InferenceResult::Text("pronto".into())));
        let resolver = resolver(mock);

        let handle = spawn_prewarm(resolver.clone(), vec!["riscaldamento".into()]).unwrap();
        let report = handle.await.unwrap();
        assert_eq!(report.generated, 1);
        assert_eq!(resolver.cache().get("riscaldamento").as_deref(), Some("pronto"));
    }

    #[tokio::test]
    async fn test_spawn_prewarm_empty_is_noop() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().never();
        assert!(spawn_prewarm(resolver(mock), Vec::new()).is_none());
    }
}
