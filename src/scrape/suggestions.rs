use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

use super::normalize_whitespace;
use crate::api_models::SuggestionsResponse;
use crate::client::Fetch;
use crate::config::NicheConfig;
use crate::errors::{ExtractError, FetchError, ParseError};

/// Turns a seed phrase into the list of phrases worth counting.
pub struct SuggestionExpander {
    fetcher: Arc<dyn Fetch>,
    config: Arc<NicheConfig>,
}

impl SuggestionExpander {
    pub fn new(fetcher: Arc<dyn Fetch>, config: Arc<NicheConfig>) -> Self {
        Self { fetcher, config }
    }

    /// Seed first, then every distinct suggestion. Never empty for a
    /// non-blank seed; upstream failures only cost the suggestions.
    pub async fn expand(&self, seed: &str) -> Vec<String> {
        let suggestions = match self.fetch_suggestions(seed).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::error!(seed, error = %e, "Error fetching suggestions");
                Vec::new()
            }
        };

        if suggestions.is_empty() {
            tracing::warn!(seed, "No suggestions found. The request might have been blocked.");
        } else {
            tracing::info!(seed, count = suggestions.len(), "Fetched suggestions");
        }

        build_candidates(seed, &suggestions)
    }

    async fn fetch_suggestions(&self, seed: &str) -> Result<Vec<String>, ExtractError> {
        let url = suggestion_url(&self.config, seed)?;
        let body = self.fetcher.fetch(url.as_str()).await?;
        Ok(parse_suggestions(url.as_str(), &body)?)
    }
}

pub fn suggestion_url(config: &NicheConfig, seed: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(&config.suggestion_url).map_err(|e| FetchError::InvalidUrl {
        url: config.suggestion_url.clone(),
        message: e.to_string(),
    })?;

    url.query_pairs_mut()
        .append_pair("limit", &config.suggestion_limit.to_string())
        .append_pair("prefix", seed)
        .append_pair("suggestion-type[]", "WIDGET")
        .append_pair("suggestion-type[]", "KEYWORD")
        .append_pair("page-type", "Detail")
        .append_pair("alias", &config.search_alias)
        .append_pair("site-variant", "desktop")
        .append_pair("version", "3")
        .append_pair("event", "onkeypress")
        .append_pair("wc", "")
        .append_pair("lop", "en_US")
        .append_pair("last-prefix", "")
        .append_pair("fb", "1")
        .append_pair("client-info", "search-ui")
        .append_pair("mid", &config.marketplace_id)
        .append_pair("plain-mid", "1");

    Ok(url)
}

fn parse_suggestions(url: &str, body: &str) -> Result<Vec<String>, ParseError> {
    let payload: SuggestionsResponse =
        serde_json::from_str(body).map_err(|e| ParseError::Json {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    match payload.suggestions {
        Some(items) => Ok(items.into_iter().filter_map(|item| item.value).collect()),
        None => {
            tracing::warn!(url, "Unexpected response format from suggestions API");
            Ok(Vec::new())
        }
    }
}

/// Merge the seed with its suggestions into a case-insensitively distinct list.
///
/// A suggestion that already starts with the seed is kept as-is; any other
/// suggestion is treated as a completion and appended to the seed.
pub fn build_candidates(seed: &str, suggestions: &[String]) -> Vec<String> {
    let seed = normalize_whitespace(seed);
    let seed_key = seed.to_lowercase();

    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(suggestions.len() + 1);

    let phrases = suggestions.iter().filter_map(|raw| {
        let suggestion = normalize_whitespace(raw);
        if suggestion.is_empty() {
            return None;
        }
        let key = suggestion.to_lowercase();
        if key == seed_key || key.starts_with(&format!("{} ", seed_key)) {
            Some(suggestion)
        } else {
            Some(format!("{} {}", seed, suggestion))
        }
    });

    for phrase in std::iter::once(seed.clone()).chain(phrases) {
        if seen.insert(phrase.to_lowercase()) {
            candidates.push(phrase);
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::HttpFetcher;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn seed_is_always_first() {
        assert_eq!(build_candidates("bold and easy", &[]), strings(&["bold and easy"]));

        let candidates = build_candidates("bold and easy", &strings(&["coloring book"]));
        assert_eq!(candidates[0], "bold and easy");
    }

    #[test]
    fn completions_are_appended_to_the_seed() {
        let candidates = build_candidates(
            "bold and easy",
            &strings(&["coloring book", "mandala coloring book", "summer coloring book"]),
        );
        assert_eq!(
            candidates,
            strings(&[
                "bold and easy",
                "bold and easy coloring book",
                "bold and easy mandala coloring book",
                "bold and easy summer coloring book",
            ])
        );
    }

    #[test]
    fn full_phrases_are_kept_as_is() {
        let candidates = build_candidates(
            "coloring book for",
            &strings(&["coloring book for adults", "Coloring Book For Kids"]),
        );
        assert_eq!(
            candidates,
            strings(&[
                "coloring book for",
                "coloring book for adults",
                "Coloring Book For Kids",
            ])
        );
    }

    #[test]
    fn duplicates_collapse_case_insensitively() {
        let candidates = build_candidates(
            "Coloring Book",
            &strings(&["coloring book", "COLORING   BOOK", "coloring book adults", "Coloring Book Adults"]),
        );
        assert_eq!(candidates, strings(&["Coloring Book", "coloring book adults"]));
    }

    #[test]
    fn blank_suggestions_are_dropped() {
        let candidates = build_candidates("seed", &strings(&["", "   ", "word"]));
        assert_eq!(candidates, strings(&["seed", "seed word"]));
    }

    #[test]
    fn url_carries_prefix_and_both_suggestion_types() {
        let url = suggestion_url(&NicheConfig::default(), "coloring book for").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("prefix".into(), "coloring book for".into())));
        assert!(pairs.contains(&("limit".into(), "11".into())));
        assert!(pairs.contains(&("alias".into(), "stripbooks".into())));
        let types: Vec<_> = pairs
            .iter()
            .filter(|(k, _)| k == "suggestion-type[]")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(types, ["WIDGET", "KEYWORD"]);
    }

    #[test]
    fn missing_suggestions_key_yields_nothing() {
        assert!(parse_suggestions("u", r#"{"alias":"stripbooks"}"#).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_suggestions("u", "<html>blocked</html>").unwrap_err();
        assert!(matches!(err, ParseError::Json { .. }));
    }

    struct Unreachable;

    #[async_trait]
    impl Fetch for Unreachable {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 403,
            })
        }
    }

    #[tokio::test]
    async fn fetch_failure_still_yields_the_seed() {
        let expander = SuggestionExpander::new(Arc::new(Unreachable), Arc::new(NicheConfig::default()));
        assert_eq!(expander.expand("bold and easy").await, strings(&["bold and easy"]));
    }

    #[tokio::test]
    async fn expands_from_live_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2017/suggestions"))
            .and(query_param("prefix", "coloring book for"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"alias":"stripbooks","prefix":"coloring book for","suggestions":[
                    {"suggType":"KeywordSuggestion","type":"KEYWORD","value":"coloring book for adults"},
                    {"suggType":"KeywordSuggestion","type":"KEYWORD","value":"coloring book for kids"},
                    {"type":"WIDGET","widgetType":"RECENT_SEARCHES"}
                ]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let config = Arc::new(NicheConfig::for_tests(&server.uri()));
        let fetcher = Arc::new(HttpFetcher::new(config.clone()).unwrap());
        let expander = SuggestionExpander::new(fetcher, config);

        assert_eq!(
            expander.expand("coloring book for").await,
            strings(&[
                "coloring book for",
                "coloring book for adults",
                "coloring book for kids",
            ])
        );
    }
}
