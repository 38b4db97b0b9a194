use std::sync::Arc;

use crate::api_models::{CandidateFailure, PhraseCount, RunReport};
use crate::client::Fetch;
use crate::config::NicheConfig;
use crate::errors::ExtractError;
use crate::scrape::{CountExtractor, SuggestionExpander};

/// Seed → candidates → counts → filtered report.
pub struct NicheFinder {
    expander: SuggestionExpander,
    extractor: CountExtractor,
}

impl NicheFinder {
    pub fn new(fetcher: Arc<dyn Fetch>, config: Arc<NicheConfig>) -> Self {
        Self {
            expander: SuggestionExpander::new(fetcher.clone(), config.clone()),
            extractor: CountExtractor::new(fetcher, config),
        }
    }

    /// Count every candidate for `seed`, one request at a time, and keep the
    /// ones under `threshold`. A failing candidate is logged and skipped.
    pub async fn run(&self, seed: &str, threshold: u64) -> RunReport {
        tracing::info!(seed, threshold, "🔍 Seed: {}", seed);

        let candidates = self.expander.expand(seed).await;
        tracing::info!(count = candidates.len(), "Evaluating candidates");

        let mut evaluated = Vec::with_capacity(candidates.len());
        let mut failures = Vec::new();

        for phrase in candidates {
            match self.extractor.count_for(&phrase).await {
                Ok(count) => {
                    tracing::info!(phrase = %phrase, count = count.value, open_ended = count.open_ended, "{} → {} results", phrase, count);
                    evaluated.push(PhraseCount { phrase, count });
                }
                Err(e) => {
                    self.log_failure(&phrase, &e);
                    failures.push(CandidateFailure {
                        connect: e.is_connect(),
                        reason: e.to_string(),
                        phrase,
                    });
                }
            }
        }

        let niches = low_competition(&evaluated, threshold);
        tracing::info!(
            evaluated = evaluated.len(),
            failed = failures.len(),
            niches = niches.len(),
            "Run complete"
        );

        RunReport {
            seed: seed.to_string(),
            threshold,
            evaluated,
            failures,
            niches,
        }
    }

    fn log_failure(&self, phrase: &str, error: &ExtractError) {
        match error {
            ExtractError::Fetch(e) => {
                tracing::error!(phrase, url = e.url(), reason = %e, "Request error, skipping phrase")
            }
            ExtractError::Parse(e) => {
                let url = self
                    .extractor
                    .search_url(phrase)
                    .map(|u| u.to_string())
                    .unwrap_or_default();
                tracing::warn!(phrase, url = %url, reason = %e, "Could not find result count, skipping phrase")
            }
        }
    }
}

/// Strictly under `threshold`, fewest results first; ties keep input order.
pub fn low_competition(evaluated: &[PhraseCount], threshold: u64) -> Vec<PhraseCount> {
    let mut niches: Vec<PhraseCount> = evaluated
        .iter()
        .filter(|pc| pc.count.value < threshold)
        .cloned()
        .collect();
    niches.sort_by_key(|pc| pc.count.value);
    niches
}
