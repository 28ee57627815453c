//! Research orchestration engine: planning, dispatch, aggregation, driving

pub mod aggregator;
pub mod dispatcher;
pub mod orchestrator;
pub mod planner;
pub mod types;

pub use aggregator::Aggregator;
pub use dispatcher::{Dispatcher, QueryOutcome};
pub use orchestrator::ResearchOrchestrator;
pub use planner::QueryPlanner;
pub use types::{
    Report, ResearchConfig, ResearchErrorKind, ResearchOutcome, ResearchProgress, ResearchRequest,
    RoundSummary, SearchQuery, SearchResult,
};
