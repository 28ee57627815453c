//! SearxNG-backed search provider
//!
//! Talks to any SearxNG instance exposing the JSON search API.

use super::{classify_http_error, classify_status, ProviderError, SearchHit, SearchProvider};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Search provider backed by a SearxNG instance
pub struct SearxProvider {
    client: reqwest::Client,
    base_url: String,
    /// Results requested per query
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

impl SearxProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            max_results: 10,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[async_trait]
impl SearchProvider for SearxProvider {
    fn name(&self) -> &str {
        "searx"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| classify_http_error(&e))?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let body: SearxResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transient(format!("malformed response: {}", e)))?;

        let hits: Vec<SearchHit> = body
            .results
            .into_iter()
            .take(self.max_results)
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                snippet: r.content,
                score: r.score,
            })
            .collect();

        debug!(query = query, hits = hits.len(), "Searx query completed");
        Ok(hits)
    }
}
