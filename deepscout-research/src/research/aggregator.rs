//! Result aggregation, deduplication and report synthesis

use super::dispatcher::QueryOutcome;
use super::types::{Report, RoundSummary, SearchResult};
use tracing::debug;
use url::Url;

/// Number of findings quoted in the report summary body
const SUMMARY_HIGHLIGHTS: usize = 5;

/// Merges round outcomes into the accumulated findings and synthesizes the
/// final report.
#[derive(Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Fold one round's outcomes into the findings.
    ///
    /// Deduplication key is the normalized URL; on collision the higher
    /// score wins and round provenance is merged. Folding the same
    /// outcomes twice is idempotent.
    pub fn fold(
        &self,
        findings: &mut Vec<SearchResult>,
        outcomes: &[QueryOutcome],
        round: usize,
    ) -> RoundSummary {
        let mut new_findings = 0;
        let mut successful = 0;
        let mut failed = 0;

        for outcome in outcomes {
            let hits = match &outcome.result {
                Ok(hits) => {
                    successful += 1;
                    hits
                }
                Err(_) => {
                    failed += 1;
                    continue;
                }
            };

            for hit in hits {
                let key = normalize_url(&hit.url);
                match findings.iter().position(|f| f.dedup_key == key) {
                    Some(index) => {
                        let existing = &mut findings[index];
                        if hit.score > existing.score {
                            existing.score = hit.score;
                            existing.title = hit.title.clone();
                            existing.snippet = hit.snippet.clone();
                        }
                        if !existing.rounds.contains(&round) {
                            existing.rounds.push(round);
                        }
                    }
                    None => {
                        findings.push(SearchResult {
                            url: hit.url.clone(),
                            dedup_key: key,
                            title: hit.title.clone(),
                            snippet: hit.snippet.clone(),
                            score: hit.score,
                            rounds: vec![round],
                        });
                        new_findings += 1;
                    }
                }
            }
        }

        let summary = RoundSummary {
            round,
            planned: outcomes.len(),
            successful,
            failed,
            new_findings,
        };
        debug!(
            round = round,
            new_findings = summary.new_findings,
            successful = summary.successful,
            failed = summary.failed,
            "Folded round outcomes"
        );
        summary
    }

    /// Synthesize the final report. Deterministic for a given findings set:
    /// citations are ordered by score descending, URL ascending.
    pub fn synthesize(&self, query: &str, findings: &[SearchResult]) -> Report {
        let mut citations = findings.to_vec();
        citations.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.url.cmp(&b.url))
        });

        let mut summary = format!("Research report: {}\n\n", query);
        if citations.is_empty() {
            summary.push_str("No findings were gathered for this query.\n");
        } else {
            summary.push_str(&format!(
                "Gathered {} distinct sources. Top findings:\n\n",
                citations.len()
            ));
            for (i, finding) in citations.iter().take(SUMMARY_HIGHLIGHTS).enumerate() {
                summary.push_str(&format!(
                    "{}. {} ({})\n   {}\n",
                    i + 1,
                    finding.title,
                    finding.url,
                    finding.snippet
                ));
            }
            summary.push_str("\nSources:\n");
            for finding in &citations {
                summary.push_str(&format!("- {}\n", finding.url));
            }
        }

        Report {
            summary,
            citations,
            generated_at: chrono::Utc::now(),
        }
    }
}

/// Normalize a URL into a deduplication key: lowercased scheme and host,
/// fragment stripped, default port dropped, trailing slash trimmed.
/// Unparseable inputs fall back to trimmed lowercase.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut normalized = url.to_string();
            while normalized.ends_with('/') {
                normalized.pop();
            }
            normalized
        }
        Err(_) => raw.trim().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderError, SearchHit};
    use crate::research::types::SearchQuery;

    fn hit(url: &str, score: f64) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            title: format!("title {}", url),
            snippet: format!("snippet {}", url),
            score,
        }
    }

    fn ok_outcome(round: usize, hits: Vec<SearchHit>) -> QueryOutcome {
        QueryOutcome {
            query: SearchQuery::new("q", round),
            result: Ok(hits),
        }
    }

    fn err_outcome(round: usize) -> QueryOutcome {
        QueryOutcome {
            query: SearchQuery::new("q", round),
            result: Err(ProviderError::transient("down")),
        }
    }

    #[test]
    fn url_normalization_collapses_equivalent_forms() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM/path/"),
            normalize_url("https://example.com/path")
        );
        assert_eq!(
            normalize_url("https://example.com/a#section"),
            normalize_url("https://example.com/a")
        );
        assert_ne!(
            normalize_url("https://example.com/a"),
            normalize_url("https://example.com/b")
        );
    }

    #[test]
    fn duplicate_urls_keep_the_higher_score_and_merge_rounds() {
        let aggregator = Aggregator::new();
        let mut findings = Vec::new();

        let r1 = aggregator.fold(
            &mut findings,
            &[ok_outcome(1, vec![hit("https://a.example/x", 0.9)])],
            1,
        );
        assert_eq!(r1.new_findings, 1);

        let r2 = aggregator.fold(
            &mut findings,
            &[ok_outcome(2, vec![hit("https://a.example/x", 0.95)])],
            2,
        );
        assert_eq!(r2.new_findings, 0);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].score, 0.95);
        assert_eq!(findings[0].rounds, vec![1, 2]);
    }

    #[test]
    fn folding_is_idempotent_and_never_lowers_scores() {
        let aggregator = Aggregator::new();
        let mut findings = Vec::new();
        let outcomes = vec![ok_outcome(
            1,
            vec![hit("https://a.example/1", 0.9), hit("https://a.example/2", 0.4)],
        )];

        aggregator.fold(&mut findings, &outcomes, 1);
        let before = findings.clone();
        let again = aggregator.fold(&mut findings, &outcomes, 1);

        assert_eq!(again.new_findings, 0);
        assert_eq!(findings.len(), before.len());
        for (a, b) in findings.iter().zip(before.iter()) {
            assert_eq!(a.dedup_key, b.dedup_key);
            assert!(a.score >= b.score);
        }
    }

    #[test]
    fn summary_counts_successes_and_failures() {
        let aggregator = Aggregator::new();
        let mut findings = Vec::new();
        let summary = aggregator.fold(
            &mut findings,
            &[
                ok_outcome(1, vec![hit("https://a.example/1", 0.5)]),
                err_outcome(1),
                err_outcome(1),
            ],
            1,
        );

        assert_eq!(summary.planned, 3);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 2);
        assert!(!summary.is_total_failure());

        let dead = aggregator.fold(&mut findings, &[err_outcome(2)], 2);
        assert!(dead.is_total_failure());
    }

    #[test]
    fn synthesis_is_deterministic_and_cites_every_finding() {
        let aggregator = Aggregator::new();
        let mut findings = Vec::new();
        aggregator.fold(
            &mut findings,
            &[ok_outcome(
                1,
                vec![
                    hit("https://a.example/low", 0.2),
                    hit("https://a.example/high", 0.9),
                    hit("https://a.example/mid", 0.5),
                ],
            )],
            1,
        );

        let report = aggregator.synthesize("test query", &findings);
        let report_again = aggregator.synthesize("test query", &findings);

        assert_eq!(report.summary, report_again.summary);
        assert_eq!(report.citations.len(), 3);
        assert_eq!(report.citations[0].url, "https://a.example/high");
        assert_eq!(report.citations[2].url, "https://a.example/low");
        assert!(report.summary.contains("https://a.example/mid"));
    }
}
