//! Types for the research orchestration engine

use deepscout_core::RetryConfig;
use serde::{Deserialize, Serialize};

/// Engine configuration: parameter bounds and dispatch policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Maximum allowed refinement rounds per session
    pub max_depth: usize,
    /// Maximum allowed sub-queries per round
    pub max_breadth: usize,
    /// Worker limit for concurrent provider calls, independent of breadth
    pub concurrency_limit: usize,
    /// Per provider-call timeout in milliseconds
    pub provider_timeout_ms: u64,
    /// Retry policy for transient provider failures
    pub retry: RetryConfig,
    /// Optional wall-clock budget for a whole session, checked at round
    /// boundaries
    pub session_budget_ms: Option<u64>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_breadth: 10,
            concurrency_limit: 4,
            provider_timeout_ms: 10_000,
            retry: RetryConfig::default(),
            session_budget_ms: None,
        }
    }
}

/// Caller-supplied parameters for a new research session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// The natural-language question to research
    pub query: String,
    /// Number of refinement rounds
    pub depth: usize,
    /// Maximum sub-queries per round
    pub breadth: usize,
    /// Model identifier used for sub-query generation
    pub model: String,
    /// Search provider identifier
    pub provider: String,
}

/// One search request planned for a round.
///
/// Ephemeral: produced by the planner, consumed by the dispatcher, not
/// persisted beyond the findings it yields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text sent to the provider
    pub text: String,
    /// Round this query belongs to (1-based)
    pub round: usize,
    /// Query this one was derived from, for traceability
    pub parent: Option<String>,
}

impl SearchQuery {
    pub fn new<S: Into<String>>(text: S, round: usize) -> Self {
        Self {
            text: text.into(),
            round,
            parent: None,
        }
    }

    pub fn derived<S: Into<String>, P: Into<String>>(text: S, round: usize, parent: P) -> Self {
        Self {
            text: text.into(),
            round,
            parent: Some(parent.into()),
        }
    }
}

/// A deduplicated search result retained in a session's findings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Source URL as returned by the provider
    pub url: String,
    /// Normalized URL used as the deduplication key
    pub dedup_key: String,
    /// Result title
    pub title: String,
    /// Snippet or content excerpt
    pub snippet: String,
    /// Relevance score; on a duplicate URL the higher score wins
    pub score: f64,
    /// Rounds this URL was discovered in, in discovery order
    pub rounds: Vec<usize>,
}

/// Final synthesized output of a completed session. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Summary text synthesized from the findings
    pub summary: String,
    /// Cited findings, ordered by score (descending) then URL
    pub citations: Vec<SearchResult>,
    /// Generation timestamp
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Per-round accounting produced by the aggregator fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round index (1-based)
    pub round: usize,
    /// Queries planned for the round
    pub planned: usize,
    /// Queries that returned successfully
    pub successful: usize,
    /// Queries that failed after retries
    pub failed: usize,
    /// Non-duplicate results the round contributed
    pub new_findings: usize,
}

impl RoundSummary {
    /// Whether the whole round came back empty-handed on every query
    pub fn is_total_failure(&self) -> bool {
        self.successful == 0
    }
}

/// Terminal error recorded on a failed session.
///
/// Never thrown through the polling interface; callers read it off the
/// session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResearchErrorKind {
    /// A whole round yielded zero successful provider calls
    ProviderExhausted,
    /// The session exceeded its wall-clock budget
    SessionTimeout,
    /// Unexpected fault in planning or aggregation
    Internal { message: String },
}

impl std::fmt::Display for ResearchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResearchErrorKind::ProviderExhausted => write!(f, "provider exhausted"),
            ResearchErrorKind::SessionTimeout => write!(f, "session timeout"),
            ResearchErrorKind::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

/// Progress snapshot returned to polling callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchProgress {
    /// Workflow id of the session
    pub workflow_id: String,
    /// Current lifecycle status
    pub status: crate::session::SessionStatus,
    /// Progress percentage, 0-100, monotonically non-decreasing
    pub progress: u8,
    /// Findings accumulated so far
    pub findings_count: usize,
}

/// Completion view returned by result retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResearchOutcome {
    /// Research finished; the report is final
    Completed { report: Report },
    /// Research failed; partial findings are retained for diagnosis
    Failed {
        error: ResearchErrorKind,
        findings_count: usize,
    },
    /// Caller-initiated cancellation; no report was synthesized
    Cancelled { findings_count: usize },
    /// Still working; poll again
    InProgress {
        #[serde(rename = "session_status")]
        status: crate::session::SessionStatus,
        progress: u8,
    },
}
