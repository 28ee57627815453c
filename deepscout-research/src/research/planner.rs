//! Query planning and sub-query derivation

use super::types::{ResearchConfig, SearchQuery, SearchResult};
use crate::provider::{ModelClient, ProviderError};
use crate::ResearchResult;
use deepscout_core::retry_if;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Round-1 expansion angles used when no model is available
const EXPANSION_TEMPLATES: &[&str] = &[
    "{} overview",
    "{} examples",
    "{} benchmarks",
    "{} limitations",
    "{} best practices",
    "{} comparison",
    "{} tutorial",
    "{} architecture",
    "{} case study",
];

/// Expands a parent query plus prior findings into the next round's
/// sub-queries.
///
/// Planning never calls the search provider; it may call the configured
/// model, under the same timeout/retry policy as dispatch. The planner may
/// return fewer queries than `breadth` and may return zero, which signals
/// the orchestrator to stop early.
pub struct QueryPlanner {
    config: ResearchConfig,
}

impl QueryPlanner {
    pub fn new(config: ResearchConfig) -> Self {
        Self { config }
    }

    /// Plan the queries for one round. The result never exceeds `breadth`.
    pub async fn plan(
        &self,
        query: &str,
        findings: &[SearchResult],
        round: usize,
        breadth: usize,
        model: Option<&Arc<dyn ModelClient>>,
    ) -> ResearchResult<Vec<SearchQuery>> {
        let mut queries = if round == 1 {
            self.plan_initial(query, breadth, model).await
        } else {
            self.plan_followup(query, findings, round, breadth, model)
                .await
        };

        queries.truncate(breadth);
        debug!(
            round = round,
            planned = queries.len(),
            breadth = breadth,
            "Planned round queries"
        );
        Ok(queries)
    }

    /// Round 1: the original query plus direct expansions
    async fn plan_initial(
        &self,
        query: &str,
        breadth: usize,
        model: Option<&Arc<dyn ModelClient>>,
    ) -> Vec<SearchQuery> {
        let mut queries = vec![SearchQuery::new(query, 1)];
        if breadth == 1 {
            return queries;
        }

        let expansions = match model {
            Some(model) => match self.generate_with_model(query, &[], 1, breadth - 1, model).await
            {
                Some(texts) => texts,
                None => self.template_expansions(query, breadth - 1),
            },
            None => self.template_expansions(query, breadth - 1),
        };

        for text in expansions {
            queries.push(SearchQuery::derived(text, 1, query));
        }
        queries
    }

    /// Rounds 2..depth: derive sub-queries from gaps in the previous
    /// round's findings. Returns an empty plan when nothing further looks
    /// worth pursuing.
    async fn plan_followup(
        &self,
        query: &str,
        findings: &[SearchResult],
        round: usize,
        breadth: usize,
        model: Option<&Arc<dyn ModelClient>>,
    ) -> Vec<SearchQuery> {
        let last_round: Vec<&SearchResult> = findings
            .iter()
            .filter(|f| f.rounds.contains(&(round - 1)))
            .collect();

        if last_round.is_empty() {
            return Vec::new();
        }

        if let Some(model) = model {
            if let Some(texts) = self
                .generate_with_model(query, &last_round, round, breadth, model)
                .await
            {
                return texts
                    .into_iter()
                    .map(|text| SearchQuery::derived(text, round, query))
                    .collect();
            }
        }

        self.keyword_followups(query, &last_round, round, breadth)
    }

    /// Template-based round-1 expansions
    fn template_expansions(&self, query: &str, count: usize) -> Vec<String> {
        EXPANSION_TEMPLATES
            .iter()
            .take(count)
            .map(|template| template.replace("{}", query))
            .collect()
    }

    /// Derive follow-up queries from keywords the previous round surfaced
    /// that the original query does not already cover.
    fn keyword_followups(
        &self,
        query: &str,
        last_round: &[&SearchResult],
        round: usize,
        breadth: usize,
    ) -> Vec<SearchQuery> {
        let covered: HashSet<String> = query
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .collect();

        let mut seen = HashSet::new();
        let mut queries = Vec::new();

        for finding in last_round {
            let text = format!("{} {}", finding.title, finding.snippet);
            for keyword in extract_keywords(&text) {
                if covered.contains(&keyword) || !seen.insert(keyword.clone()) {
                    continue;
                }
                queries.push(SearchQuery::derived(
                    format!("{} {}", query, keyword),
                    round,
                    query,
                ));
                if queries.len() >= breadth {
                    return queries;
                }
            }
        }

        queries
    }

    /// Ask the model for sub-queries; None means the caller should fall
    /// back to template/keyword planning.
    async fn generate_with_model(
        &self,
        query: &str,
        last_round: &[&SearchResult],
        round: usize,
        count: usize,
        model: &Arc<dyn ModelClient>,
    ) -> Option<Vec<String>> {
        let prompt = build_planning_prompt(query, last_round, round, count);

        let response = match self.call_model(model, prompt).await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    round = round,
                    error = %error,
                    "Model planning failed, falling back to heuristic planning"
                );
                return None;
            }
        };

        let texts = parse_query_list(&response)?;
        Some(texts.into_iter().take(count).collect())
    }

    /// One model call under the dispatch timeout/retry policy
    async fn call_model(
        &self,
        model: &Arc<dyn ModelClient>,
        prompt: String,
    ) -> Result<String, ProviderError> {
        let timeout_ms = self.config.provider_timeout_ms;
        let model = Arc::clone(model);
        retry_if(
            move || {
                let model = Arc::clone(&model);
                let prompt = prompt.clone();
                async move {
                    match tokio::time::timeout(
                        Duration::from_millis(timeout_ms),
                        model.generate(&prompt),
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
            &self.config.retry,
            ProviderError::is_retryable,
            "model_generate",
        )
        .await
    }
}

fn build_planning_prompt(
    query: &str,
    last_round: &[&SearchResult],
    round: usize,
    count: usize,
) -> String {
    if round == 1 {
        format!(
            r#"You are a research planner. Given a research question, produce up to {count} focused web-search queries that together cover its main aspects.

Research question: "{query}"

Respond with a JSON array of strings, nothing else. Return an empty array only if the question cannot be decomposed further."#,
        )
    } else {
        let digest: String = last_round
            .iter()
            .take(10)
            .map(|f| format!("- {}: {}\n", f.title, f.snippet))
            .collect();
        format!(
            r#"You are a research planner refining an ongoing investigation.

Research question: "{query}"

Findings from the previous round:
{digest}
Produce up to {count} new web-search queries that address gaps or ambiguities left by these findings. Respond with a JSON array of strings, nothing else. Return an empty array if the findings already cover the question."#,
        )
    }
}

/// Extract a JSON array of strings from a model response
fn parse_query_list(response: &str) -> Option<Vec<String>> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    let texts: Vec<String> = serde_json::from_str(&response[start..=end]).ok()?;
    Some(
        texts
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

fn extract_keywords(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(title: &str, snippet: &str, round: usize) -> SearchResult {
        SearchResult {
            url: format!("https://example.com/{}", title),
            dedup_key: format!("https://example.com/{}", title),
            title: title.to_string(),
            snippet: snippet.to_string(),
            score: 0.5,
            rounds: vec![round],
        }
    }

    #[tokio::test]
    async fn round_one_includes_the_original_query_first() {
        let planner = QueryPlanner::new(ResearchConfig::default());
        let queries = planner
            .plan("rust async runtimes", &[], 1, 4, None)
            .await
            .unwrap();

        assert_eq!(queries.len(), 4);
        assert_eq!(queries[0].text, "rust async runtimes");
        assert!(queries.iter().all(|q| q.round == 1));
    }

    #[tokio::test]
    async fn plan_never_exceeds_breadth() {
        let planner = QueryPlanner::new(ResearchConfig::default());
        let queries = planner.plan("rust", &[], 1, 2, None).await.unwrap();
        assert_eq!(queries.len(), 2);

        let queries = planner.plan("rust", &[], 1, 1, None).await.unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].text, "rust");
    }

    #[tokio::test]
    async fn followup_rounds_derive_from_new_keywords() {
        let planner = QueryPlanner::new(ResearchConfig::default());
        let findings = vec![finding("Write-through caching", "Redis eviction policies", 1)];

        let queries = planner
            .plan("database latency", &findings, 2, 3, None)
            .await
            .unwrap();

        assert!(!queries.is_empty());
        assert!(queries.len() <= 3);
        for q in &queries {
            assert!(q.text.starts_with("database latency "));
            assert_eq!(q.parent.as_deref(), Some("database latency"));
            assert_eq!(q.round, 2);
        }
    }

    #[tokio::test]
    async fn followup_plan_is_empty_when_findings_add_nothing() {
        let planner = QueryPlanner::new(ResearchConfig::default());
        // Every word in the findings is already covered by the query or too
        // short to be a keyword.
        let findings = vec![finding("alpha beta", "beta alpha ok", 1)];

        let queries = planner
            .plan("alpha beta", &findings, 2, 5, None)
            .await
            .unwrap();
        assert!(queries.is_empty());
    }

    #[tokio::test]
    async fn followup_plan_is_empty_without_prior_round_findings() {
        let planner = QueryPlanner::new(ResearchConfig::default());
        let findings = vec![finding("fresh topic material", "plenty of keywords here", 1)];

        // Round 3 looks at round-2 findings, of which there are none.
        let queries = planner
            .plan("some query", &findings, 3, 5, None)
            .await
            .unwrap();
        assert!(queries.is_empty());
    }

    #[test]
    fn query_list_parsing_tolerates_surrounding_prose() {
        let response = r#"Here you go:
["rust tokio scheduler", "rust async cancellation"]
Hope that helps."#;
        let texts = parse_query_list(response).unwrap();
        assert_eq!(
            texts,
            vec!["rust tokio scheduler", "rust async cancellation"]
        );

        assert!(parse_query_list("no json here").is_none());
        assert_eq!(parse_query_list("[]").unwrap().len(), 0);
    }
}
