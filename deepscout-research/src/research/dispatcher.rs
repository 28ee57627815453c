//! Concurrent round dispatch with bounded parallelism, timeout and retry

use super::types::{ResearchConfig, SearchQuery};
use crate::provider::{ProviderError, SearchHit, SearchProvider};
use crate::{ResearchError, ResearchResult};
use deepscout_core::{process_concurrently, retry_if};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::debug;

/// Outcome of one dispatched query. Provider-side failures are values, not
/// errors; the aggregator decides their significance.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query: SearchQuery,
    pub result: Result<Vec<SearchHit>, ProviderError>,
}

/// Runs a round's queries concurrently against the provider.
///
/// Parallelism is bounded by a fixed worker limit independent of breadth.
/// Each call gets a timeout; transient and rate-limit failures are retried
/// with backoff. A failure on one query never aborts its siblings.
pub struct Dispatcher {
    config: ResearchConfig,
}

impl Dispatcher {
    pub fn new(config: ResearchConfig) -> Self {
        Self { config }
    }

    /// Execute one round. Returns exactly one outcome per input query;
    /// completion order is unspecified.
    ///
    /// Refuses a batch larger than `breadth` - a planner cap violation is a
    /// programming fault, not a provider fault.
    pub async fn run_round(
        &self,
        queries: Vec<SearchQuery>,
        provider: &Arc<dyn SearchProvider>,
        breadth: usize,
    ) -> ResearchResult<Vec<QueryOutcome>> {
        if queries.len() > breadth {
            return Err(ResearchError::internal(format!(
                "planner produced {} queries for breadth {}",
                queries.len(),
                breadth
            )));
        }

        let planned = queries.len();
        let outcomes = process_concurrently(queries, self.config.concurrency_limit, |query| {
            let provider = Arc::clone(provider);
            let retry = self.config.retry.clone();
            let timeout_ms = self.config.provider_timeout_ms;
            async move {
                let result = Self::search_with_policy(&provider, &query, timeout_ms, &retry).await;
                QueryOutcome { query, result }
            }
        })
        .await;

        debug!(
            planned = planned,
            succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count(),
            "Round dispatch finished"
        );
        Ok(outcomes)
    }

    /// One provider call under the timeout/retry policy
    async fn search_with_policy(
        provider: &Arc<dyn SearchProvider>,
        query: &SearchQuery,
        timeout_ms: u64,
        retry: &deepscout_core::RetryConfig,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let provider = Arc::clone(provider);
        let text = query.text.clone();
        retry_if(
            move || {
                let provider = Arc::clone(&provider);
                let text = text.clone();
                async move {
                    match tokio::time::timeout(
                        Duration::from_millis(timeout_ms),
                        provider.search(&text),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout {
                            timeout_ms: Some(timeout_ms),
                        }),
                    }
                }
            },
            retry,
            ProviderError::is_retryable,
            "provider_search",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepscout_core::RetryConfig;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> ResearchConfig {
        ResearchConfig {
            concurrency_limit: 2,
            provider_timeout_ms: 50,
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 1,
                max_delay_ms: 5,
                backoff_multiplier: 2.0,
                jitter: false,
            },
            ..ResearchConfig::default()
        }
    }

    fn queries(texts: &[&str]) -> Vec<SearchQuery> {
        texts.iter().map(|t| SearchQuery::new(*t, 1)).collect()
    }

    /// Succeeds on every query, echoing it back as a single hit
    struct EchoProvider;

    #[async_trait]
    impl SearchProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
            Ok(vec![SearchHit {
                url: format!("https://example.com/{}", query.replace(' ', "-")),
                title: query.to_string(),
                snippet: String::new(),
                score: 0.5,
            }])
        }
    }

    /// Fails transiently a fixed number of times before succeeding
    struct FlakyProvider {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(ProviderError::transient("blip"));
            }
            Ok(vec![SearchHit {
                url: format!("https://example.com/{}", query),
                title: query.to_string(),
                snippet: String::new(),
                score: 0.5,
            }])
        }
    }

    struct AuthFailProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for AuthFailProvider {
        fn name(&self) -> &str {
            "authfail"
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::auth("bad key"))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl SearchProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, ProviderError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn every_query_gets_exactly_one_outcome() {
        let dispatcher = Dispatcher::new(test_config());
        let provider: Arc<dyn SearchProvider> = Arc::new(EchoProvider);

        let outcomes = dispatcher
            .run_round(queries(&["a", "b", "c", "d", "e"]), &provider, 5)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 5);
        let texts: HashSet<String> = outcomes.iter().map(|o| o.query.text.clone()).collect();
        assert_eq!(texts.len(), 5, "each input query paired with one outcome");
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_then_succeed() {
        let dispatcher = Dispatcher::new(test_config());
        let provider: Arc<dyn SearchProvider> = Arc::new(FlakyProvider {
            failures: 2,
            calls: AtomicUsize::new(0),
        });

        let outcomes = dispatcher
            .run_round(queries(&["only"]), &provider, 1)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_ok(), "should recover within 3 attempts");
    }

    #[tokio::test]
    async fn auth_failures_are_terminal_and_not_retried() {
        let dispatcher = Dispatcher::new(test_config());
        let counted = Arc::new(AuthFailProvider {
            calls: AtomicUsize::new(0),
        });
        let provider: Arc<dyn SearchProvider> = counted.clone();

        let outcomes = dispatcher
            .run_round(queries(&["x"]), &provider, 1)
            .await
            .unwrap();

        assert!(matches!(
            outcomes[0].result,
            Err(ProviderError::Auth { .. })
        ));
        assert_eq!(counted.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failing_query_never_aborts_its_siblings() {
        let dispatcher = Dispatcher::new(test_config());

        struct MixedProvider;

        #[async_trait]
        impl SearchProvider for MixedProvider {
            fn name(&self) -> &str {
                "mixed"
            }

            async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
                if query == "bad" {
                    Err(ProviderError::auth("nope"))
                } else {
                    Ok(vec![])
                }
            }
        }

        let provider: Arc<dyn SearchProvider> = Arc::new(MixedProvider);
        let outcomes = dispatcher
            .run_round(queries(&["good", "bad", "also good"]), &provider, 3)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.result.is_ok()).count(), 2);
        assert_eq!(outcomes.iter().filter(|o| o.result.is_err()).count(), 1);
    }

    #[tokio::test]
    async fn slow_calls_surface_as_timeouts() {
        let dispatcher = Dispatcher::new(test_config());
        let provider: Arc<dyn SearchProvider> = Arc::new(SlowProvider);

        let outcomes = dispatcher
            .run_round(queries(&["slow"]), &provider, 1)
            .await
            .unwrap();

        assert!(matches!(
            outcomes[0].result,
            Err(ProviderError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn oversized_batches_are_refused() {
        let dispatcher = Dispatcher::new(test_config());
        let provider: Arc<dyn SearchProvider> = Arc::new(EchoProvider);

        let result = dispatcher
            .run_round(queries(&["a", "b", "c"]), &provider, 2)
            .await;
        assert!(result.is_err());
    }
}
