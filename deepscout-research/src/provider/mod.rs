//! Search provider boundary
//!
//! The engine talks to the outside world through the `SearchProvider`
//! capability trait. Concrete providers form a small closed set selected by
//! identifier at session creation through the `ProviderRegistry`.

pub mod model;
pub mod searx;

pub use model::{ModelClient, OpenAiChatClient};
pub use searx::SearxProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// One ranked snippet returned by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

/// Provider-side failure taxonomy.
///
/// `Transient` and `RateLimited` are retried by the dispatcher; `Timeout`
/// and `Auth` are terminal for the query that hit them.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("provider call timed out{}", timeout_ms.map(|ms| format!(" after {}ms", ms)).unwrap_or_default())]
    Timeout {
        /// Elapsed budget, when the timeout was enforced by the dispatcher
        /// rather than the HTTP layer
        timeout_ms: Option<u64>,
    },

    #[error("transient provider failure: {message}")]
    Transient { message: String },

    #[error("provider authentication failed: {message}")]
    Auth { message: String },

    #[error("provider rate limited")]
    RateLimited { retry_after_ms: Option<u64> },
}

impl ProviderError {
    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Whether the dispatcher should retry the call
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transient { .. } | ProviderError::RateLimited { .. }
        )
    }
}

/// External search capability: execute one text query, return ranked
/// snippets or fail.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider identifier used for registry lookup and logging
    fn name(&self) -> &str;

    /// Execute one search query
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Registry of available providers and model clients, keyed by identifier.
///
/// Sessions pick their provider and model by name at creation time; the two
/// are independent configuration axes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SearchProvider>>,
    models: HashMap<String, Arc<dyn ModelClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a search provider under its own name
    pub fn register_provider(&mut self, provider: Arc<dyn SearchProvider>) {
        self.providers
            .insert(provider.name().to_string(), provider);
    }

    /// Register a model client under the given identifier
    pub fn register_model(&mut self, name: &str, model: Arc<dyn ModelClient>) {
        self.models.insert(name.to_string(), model);
    }

    pub fn resolve_provider(&self, name: &str) -> Option<Arc<dyn SearchProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn resolve_model(&self, name: &str) -> Option<Arc<dyn ModelClient>> {
        self.models.get(name).cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

/// Map a reqwest failure onto the provider taxonomy
pub(crate) fn classify_http_error(error: &reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        return ProviderError::Timeout { timeout_ms: None };
    }
    if let Some(status) = error.status() {
        return classify_status(status);
    }
    ProviderError::transient(error.to_string())
}

/// Map an HTTP status onto the provider taxonomy
pub(crate) fn classify_status(status: reqwest::StatusCode) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::auth(format!("HTTP {}", status)),
        429 => ProviderError::RateLimited {
            retry_after_ms: None,
        },
        s if s >= 500 => ProviderError::transient(format!("HTTP {}", status)),
        _ => ProviderError::transient(format!("unexpected HTTP {}", status)),
    }
}
