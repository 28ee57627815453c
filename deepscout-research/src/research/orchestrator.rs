//! Top-level research driver
//!
//! Owns the depth loop: plan, dispatch, fold, persist, finalize. Sessions
//! execute on the runtime detached from the creating caller; the workflow
//! id is returned immediately and progress is polled through the store.

use super::aggregator::Aggregator;
use super::dispatcher::Dispatcher;
use super::planner::QueryPlanner;
use super::types::{ResearchConfig, ResearchErrorKind, ResearchRequest};
use crate::provider::{ModelClient, SearchProvider};
use crate::session::{ResearchSession, SessionStore};
use crate::{ResearchError, ResearchResult};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct ResearchOrchestrator {
    planner: QueryPlanner,
    dispatcher: Dispatcher,
    aggregator: Aggregator,
    store: Arc<SessionStore>,
    config: ResearchConfig,
}

impl ResearchOrchestrator {
    pub fn new(config: ResearchConfig, store: Arc<SessionStore>) -> Self {
        Self {
            planner: QueryPlanner::new(config.clone()),
            dispatcher: Dispatcher::new(config.clone()),
            aggregator: Aggregator::new(),
            store,
            config,
        }
    }

    /// Validate request parameters. Fails before any session exists, so
    /// bad input never leaves a record behind.
    pub fn validate(&self, request: &ResearchRequest) -> ResearchResult<()> {
        if request.query.trim().is_empty() {
            return Err(ResearchError::validation("query must not be empty"));
        }
        if request.depth < 1 || request.depth > self.config.max_depth {
            return Err(ResearchError::validation(format!(
                "depth must be between 1 and {}, got {}",
                self.config.max_depth, request.depth
            )));
        }
        if request.breadth < 1 || request.breadth > self.config.max_breadth {
            return Err(ResearchError::validation(format!(
                "breadth must be between 1 and {}, got {}",
                self.config.max_breadth, request.breadth
            )));
        }
        Ok(())
    }

    /// Create the session and start the round loop in the background.
    /// Returns the workflow id without waiting for research to finish.
    pub async fn launch(
        self: Arc<Self>,
        request: ResearchRequest,
        provider: Arc<dyn SearchProvider>,
        model: Option<Arc<dyn ModelClient>>,
    ) -> ResearchResult<String> {
        self.validate(&request)?;

        let id = Uuid::new_v4().to_string();
        let session = ResearchSession::new(id.clone(), &request);
        self.store.create(session).await;

        info!(
            workflow_id = %id,
            depth = request.depth,
            breadth = request.breadth,
            provider = %request.provider,
            "Starting research session"
        );

        let this = Arc::clone(&self);
        let workflow_id = id.clone();
        tokio::spawn(async move {
            this.run(workflow_id, provider, model).await;
        });

        Ok(id)
    }

    /// Execute the session loop, converting any unhandled fault into a
    /// terminal Failed state with progress frozen at its last value.
    async fn run(
        self: Arc<Self>,
        id: String,
        provider: Arc<dyn SearchProvider>,
        model: Option<Arc<dyn ModelClient>>,
    ) {
        if let Err(e) = self.drive(&id, provider, model).await {
            error!(workflow_id = %id, error = %e, "Research session hit an internal fault");
            let _ = self
                .store
                .update(&id, |s| {
                    s.fail(ResearchErrorKind::Internal {
                        message: e.to_string(),
                    })
                })
                .await;
        }
    }

    async fn drive(
        &self,
        id: &str,
        provider: Arc<dyn SearchProvider>,
        model: Option<Arc<dyn ModelClient>>,
    ) -> ResearchResult<()> {
        let started = Instant::now();
        self.store.update(id, |s| s.mark_running()).await?;

        let base = self.store.get(id).await?;
        let (query, depth, breadth) = (base.query, base.depth, base.breadth);

        for round in 1..=depth {
            let snapshot = self.store.get(id).await?;

            // Cancellation and budget are observed at round boundaries
            // only; in-flight provider calls are individually time-bounded.
            if snapshot.cancel_requested {
                info!(workflow_id = %id, round = round, "Cancellation observed at round boundary");
                self.store.update(id, |s| s.cancel()).await?;
                return Ok(());
            }
            if let Some(budget_ms) = self.config.session_budget_ms {
                if started.elapsed().as_millis() as u64 >= budget_ms {
                    warn!(workflow_id = %id, budget_ms = budget_ms, "Session budget exceeded");
                    self.store
                        .update(id, |s| s.fail(ResearchErrorKind::SessionTimeout))
                        .await?;
                    return Ok(());
                }
            }

            let queries = self
                .planner
                .plan(&query, &snapshot.findings, round, breadth, model.as_ref())
                .await?;
            if queries.is_empty() {
                info!(workflow_id = %id, round = round, "Planner sees nothing further to pursue, stopping early");
                break;
            }

            let outcomes = self.dispatcher.run_round(queries, &provider, breadth).await?;

            let summary = self
                .store
                .update(id, |s| {
                    let summary = self.aggregator.fold(&mut s.findings, &outcomes, round);
                    s.advance_progress(((round * 100) / depth) as u8);
                    summary
                })
                .await?;

            info!(
                workflow_id = %id,
                round = round,
                new_findings = summary.new_findings,
                successful = summary.successful,
                failed = summary.failed,
                "Round completed"
            );

            if summary.is_total_failure() {
                warn!(workflow_id = %id, round = round, "Entire round failed, giving up");
                self.store
                    .update(id, |s| s.fail(ResearchErrorKind::ProviderExhausted))
                    .await?;
                return Ok(());
            }
        }

        let snapshot = self.store.get(id).await?;
        if snapshot.cancel_requested {
            self.store.update(id, |s| s.cancel()).await?;
            return Ok(());
        }

        let report = self.aggregator.synthesize(&query, &snapshot.findings);
        let citations = report.citations.len();
        self.store.update(id, |s| s.complete(report)).await?;
        info!(workflow_id = %id, citations = citations, "Research session completed");
        Ok(())
    }
}
