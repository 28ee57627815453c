//! Unified error handling
//!
//! Structured error types with proper chaining, plus recoverability hints
//! used by the retry machinery.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Base error type shared across Deepscout crates
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("operation timed out: {operation} ({duration_ms}ms)")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a validation error without a field reference
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error pointing at a specific field
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Create a network error without a source
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error with a source
    pub fn internal_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Whether retrying the failed operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::Network { .. } | CoreError::Timeout { .. } | CoreError::RateLimit { .. }
        )
    }

    /// Suggested retry delay for recoverable errors
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            CoreError::Network { .. } => Some(1000),
            CoreError::Timeout { .. } => Some(2000),
            CoreError::RateLimit { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability_follows_taxonomy() {
        assert!(CoreError::network("connection reset").is_recoverable());
        assert!(CoreError::timeout("search", 5000).is_recoverable());
        assert!(!CoreError::validation("empty query").is_recoverable());
        assert!(!CoreError::not_found("session abc").is_recoverable());
    }

    #[test]
    fn rate_limit_carries_retry_hint() {
        let err = CoreError::RateLimit {
            message: "slow down".to_string(),
            retry_after_ms: Some(1500),
        };
        assert_eq!(err.retry_delay_ms(), Some(1500));
    }
}
