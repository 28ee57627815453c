//! Research session entity and lifecycle state machine

use crate::research::types::{Report, ResearchErrorKind, ResearchRequest, SearchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow lifecycle states.
///
/// `Pending -> Running -> {Completed, Failed, Cancelled}`; the three
/// terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The stateful research workflow entity.
///
/// Owned exclusively by the `SessionStore`; all mutation goes through the
/// store's update contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSession {
    /// Opaque workflow id, immutable after creation
    pub id: String,
    /// Original query text
    pub query: String,
    /// Refinement rounds requested
    pub depth: usize,
    /// Maximum sub-queries per round
    pub breadth: usize,
    /// Model identifier for sub-query generation
    pub model: String,
    /// Search provider identifier
    pub provider: String,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Progress percentage, 0-100, monotonically non-decreasing
    pub progress: u8,
    /// Accumulated findings, deduplicated, never shrinking
    pub findings: Vec<SearchResult>,
    /// Final report, present only when status is Completed
    pub report: Option<Report>,
    /// Terminal error, present only when status is Failed
    pub error: Option<ResearchErrorKind>,
    /// Set by the caller; observed by the orchestrator at round boundaries
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResearchSession {
    /// Create a fresh Pending session from validated parameters
    pub fn new(id: String, request: &ResearchRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            query: request.query.clone(),
            depth: request.depth,
            breadth: request.breadth,
            model: request.model.clone(),
            provider: request.provider.clone(),
            status: SessionStatus::Pending,
            progress: 0,
            findings: Vec::new(),
            report: None,
            error: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition Pending -> Running
    pub fn mark_running(&mut self) {
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Running;
        }
    }

    /// Raise progress; never moves backward, never reaches 100 while the
    /// session is still running.
    pub fn advance_progress(&mut self, progress: u8) {
        let capped = progress.min(99);
        if capped > self.progress {
            self.progress = capped;
        }
    }

    /// Transition to Completed with the final report; progress jumps to 100
    pub fn complete(&mut self, report: Report) {
        if self.is_terminal() {
            return;
        }
        self.status = SessionStatus::Completed;
        self.progress = 100;
        self.report = Some(report);
        self.completed_at = Some(Utc::now());
    }

    /// Transition to Failed; progress is frozen at its last reported value
    /// and findings gathered so far are retained.
    pub fn fail(&mut self, error: ResearchErrorKind) {
        if self.is_terminal() {
            return;
        }
        self.status = SessionStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }

    /// Transition to Cancelled; no report is synthesized
    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = SessionStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ResearchRequest {
        ResearchRequest {
            query: "impact of caching on database latency".to_string(),
            depth: 3,
            breadth: 4,
            model: "gpt-4o-mini".to_string(),
            provider: "searx".to_string(),
        }
    }

    #[test]
    fn progress_is_monotone_and_capped_while_running() {
        let mut session = ResearchSession::new("w-1".to_string(), &request());
        session.mark_running();

        session.advance_progress(33);
        assert_eq!(session.progress, 33);
        session.advance_progress(20);
        assert_eq!(session.progress, 33, "progress must never move backward");
        session.advance_progress(100);
        assert_eq!(session.progress, 99, "100 is reserved for completion");
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let mut session = ResearchSession::new("w-2".to_string(), &request());
        session.mark_running();
        session.advance_progress(66);
        session.fail(ResearchErrorKind::ProviderExhausted);

        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.progress, 66, "failure freezes progress");

        session.cancel();
        assert_eq!(session.status, SessionStatus::Failed);
        session.complete(Report {
            summary: String::new(),
            citations: vec![],
            generated_at: Utc::now(),
        });
        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.report.is_none());
    }

    #[test]
    fn completion_sets_progress_to_exactly_100() {
        let mut session = ResearchSession::new("w-3".to_string(), &request());
        session.mark_running();
        session.complete(Report {
            summary: "done".to_string(),
            citations: vec![],
            generated_at: Utc::now(),
        });

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.progress, 100);
        assert!(session.report.is_some());
        assert!(session.completed_at.is_some());
    }
}
