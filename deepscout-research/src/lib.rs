//! Deepscout Research - bounded multi-round web-research orchestration
//!
//! Given a query, a depth (refinement rounds) and a breadth (sub-queries
//! per round), the engine expands the query into a tree of search
//! requests, dispatches them concurrently to a pluggable provider with
//! timeout and retry, deduplicates the findings, and synthesizes a final
//! report. Progress is observable via a stable workflow id and the result
//! is retrievable asynchronously.
//!
//! ## Architecture
//!
//! - **provider**: the capability boundaries (search provider, model)
//! - **research**: planner, dispatcher, aggregator, orchestrator
//! - **session**: the workflow entity and its store
//! - [`DeepscoutApplication`]: the facade surrounding collaborators use

pub mod provider;
pub mod research;
pub mod session;

pub use provider::{
    ModelClient, OpenAiChatClient, ProviderError, ProviderRegistry, SearchHit, SearchProvider,
    SearxProvider,
};
pub use research::{
    Report, ResearchConfig, ResearchErrorKind, ResearchOrchestrator, ResearchOutcome,
    ResearchProgress, ResearchRequest, SearchQuery, SearchResult,
};
pub use session::{ResearchSession, SessionStatus, SessionStore};

use std::sync::Arc;

/// Engine-level error type
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("core error: {0}")]
    Core(#[from] deepscout_core::CoreError),

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("provider error: {0}")]
    Provider(#[from] provider::ProviderError),

    #[error("session error: {message}")]
    Session { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ResearchResult<T> = Result<T, ResearchError>;

impl ResearchError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a session error
    pub fn session<S: Into<String>>(message: S) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Builder for [`DeepscoutApplication`]
pub struct DeepscoutApplicationBuilder {
    config: ResearchConfig,
    registry: ProviderRegistry,
}

impl DeepscoutApplicationBuilder {
    pub fn new(config: ResearchConfig) -> Self {
        Self {
            config,
            registry: ProviderRegistry::new(),
        }
    }

    /// Register a search provider under its own name
    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.registry.register_provider(provider);
        self
    }

    /// Register a SearxNG instance as the "searx" provider
    pub fn with_searx(self, base_url: impl Into<String>) -> Self {
        self.with_provider(Arc::new(SearxProvider::new(base_url)))
    }

    /// Register a model client under the given identifier
    pub fn with_model(mut self, name: &str, model: Arc<dyn ModelClient>) -> Self {
        self.registry.register_model(name, model);
        self
    }

    pub fn build(self) -> DeepscoutApplication {
        let store = Arc::new(SessionStore::new());
        let orchestrator = Arc::new(ResearchOrchestrator::new(
            self.config,
            Arc::clone(&store),
        ));
        DeepscoutApplication {
            store,
            orchestrator,
            registry: self.registry,
        }
    }
}

/// Main application facade.
///
/// Surrounding collaborators consume exactly three operations: create a
/// session, poll its progress, retrieve its completion - all keyed by
/// workflow id.
pub struct DeepscoutApplication {
    store: Arc<SessionStore>,
    orchestrator: Arc<ResearchOrchestrator>,
    registry: ProviderRegistry,
}

impl DeepscoutApplication {
    /// Create an application with default configuration and no providers
    /// registered; mostly useful with [`DeepscoutApplication::builder`].
    pub fn builder(config: ResearchConfig) -> DeepscoutApplicationBuilder {
        DeepscoutApplicationBuilder::new(config)
    }

    /// Start a research session. Validation failures surface synchronously;
    /// on success the returned workflow id can be polled immediately while
    /// research proceeds in the background.
    ///
    /// `model` and `provider` are independent axes: an unknown provider is
    /// a validation error, while an unknown model falls back to heuristic
    /// planning.
    pub async fn start_research(&self, request: ResearchRequest) -> ResearchResult<String> {
        self.orchestrator.validate(&request)?;

        let provider = self
            .registry
            .resolve_provider(&request.provider)
            .ok_or_else(|| {
                ResearchError::validation(format!("unknown provider: {}", request.provider))
            })?;
        let model = self.registry.resolve_model(&request.model);

        Arc::clone(&self.orchestrator)
            .launch(request, provider, model)
            .await
    }

    /// Poll progress and status for a workflow id
    pub async fn get_progress(&self, workflow_id: &str) -> ResearchResult<ResearchProgress> {
        let session = self.store.get(workflow_id).await?;
        Ok(ResearchProgress {
            workflow_id: session.id,
            status: session.status,
            progress: session.progress,
            findings_count: session.findings.len(),
        })
    }

    /// Retrieve the completion view for a workflow id.
    ///
    /// Always returns a value describing the (possibly failed) state;
    /// `NotFound` is reserved for ids that do not exist or were evicted.
    pub async fn get_result(&self, workflow_id: &str) -> ResearchResult<ResearchOutcome> {
        let session = self.store.get(workflow_id).await?;
        Ok(match session.status {
            SessionStatus::Completed => {
                let report = session.report.ok_or_else(|| {
                    ResearchError::internal("completed session has no report")
                })?;
                ResearchOutcome::Completed { report }
            }
            SessionStatus::Failed => {
                let error = session.error.unwrap_or(ResearchErrorKind::Internal {
                    message: "failed session carries no error".to_string(),
                });
                ResearchOutcome::Failed {
                    error,
                    findings_count: session.findings.len(),
                }
            }
            SessionStatus::Cancelled => ResearchOutcome::Cancelled {
                findings_count: session.findings.len(),
            },
            status @ (SessionStatus::Pending | SessionStatus::Running) => {
                ResearchOutcome::InProgress {
                    status,
                    progress: session.progress,
                }
            }
        })
    }

    /// Request cancellation of a running session. Observed at the next
    /// round boundary; a no-op on terminal sessions.
    pub async fn cancel_research(&self, workflow_id: &str) -> ResearchResult<()> {
        self.store.request_cancel(workflow_id).await
    }

    /// Snapshot every known session, for operational visibility
    pub async fn list_research(&self) -> Vec<ResearchProgress> {
        self.store
            .list()
            .await
            .into_iter()
            .map(|s| ResearchProgress {
                workflow_id: s.id,
                status: s.status,
                progress: s.progress,
                findings_count: s.findings.len(),
            })
            .collect()
    }

    /// Evict a session from the store. Terminal sessions stay retrievable
    /// until this is called.
    pub async fn evict(&self, workflow_id: &str) -> ResearchResult<()> {
        self.store.remove(workflow_id).await
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::{
        DeepscoutApplication, DeepscoutApplicationBuilder, ResearchConfig, ResearchError,
        ResearchOutcome, ResearchProgress, ResearchRequest, ResearchResult, SessionStatus,
    };
}
