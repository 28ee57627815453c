//! Deepscout Core - shared error taxonomy and async building blocks
//!
//! This crate holds the pieces every other Deepscout crate leans on:
//! structured errors, retry/timeout/bounded-concurrency helpers, and
//! logging initialization.

pub mod async_utils;
pub mod error;
pub mod logging;

pub use async_utils::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tokio;
pub use tracing;
