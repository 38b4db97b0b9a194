use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

use super::normalize_whitespace;
use crate::api_models::ResultCount;
use crate::client::Fetch;
use crate::config::NicheConfig;
use crate::errors::{ExtractError, FetchError, ParseError};

const NON_VISIBLE: [&str; 3] = ["script", "style", "noscript"];

/// Containers that carry the "1-48 of over 10,000 results" banner, most
/// specific first.
const COUNT_CONTAINERS: [&str; 3] = [
    r#"span[data-component-type="s-result-info-bar"]"#,
    "div.sg-col-inner",
    "div.a-section.a-spacing-small.a-spacing-top-small",
];

lazy_static! {
    // Tried in order; the first pattern that matches decides.
    static ref COUNT_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)(over\s+)?(\d[\d,]*)(\+)?\s+results?\b").expect("valid results pattern"),
        Regex::new(r"(?i)\b(over\s+)(\d[\d,]*)(\+)?").expect("valid over pattern"),
        Regex::new(r"(?i)(over\s+)?(\d[\d,]*)(\+)?\s+products?\b").expect("valid products pattern"),
    ];
    static ref CONTAINER_SELECTORS: Vec<Selector> = COUNT_CONTAINERS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();
    static ref BODY_SELECTOR: Selector = Selector::parse("body").expect("valid body selector");
}

/// Looks up how many results the search page reports for a phrase.
pub struct CountExtractor {
    fetcher: Arc<dyn Fetch>,
    config: Arc<NicheConfig>,
}

impl CountExtractor {
    pub fn new(fetcher: Arc<dyn Fetch>, config: Arc<NicheConfig>) -> Self {
        Self { fetcher, config }
    }

    pub fn search_url(&self, phrase: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.config.search_url).map_err(|e| FetchError::InvalidUrl {
            url: self.config.search_url.clone(),
            message: e.to_string(),
        })?;
        url.query_pairs_mut().append_pair("k", phrase);
        Ok(url)
    }

    pub async fn count_for(&self, phrase: &str) -> Result<ResultCount, ExtractError> {
        let url = self.search_url(phrase)?;
        let html = self.fetcher.fetch(url.as_str()).await?;
        Ok(parse_result_count(phrase, &html)?)
    }
}

/// Extract the result count from a search page.
///
/// The known banner containers are searched first; if none of them mention a
/// count the whole body is scanned.
pub fn parse_result_count(phrase: &str, html: &str) -> Result<ResultCount, ParseError> {
    let document = Html::parse_document(html);

    let banners = CONTAINER_SELECTORS
        .iter()
        .flat_map(|selector| document.select(selector));
    let body = document.select(&BODY_SELECTOR);

    for element in banners.chain(body) {
        if let Some(count) = count_in_text(phrase, &element_text(element)) {
            return count;
        }
    }

    Err(ParseError::CountNotFound {
        phrase: phrase.to_string(),
    })
}

/// Visible text of `element`; script, style and noscript contents are left out.
fn element_text(element: ElementRef<'_>) -> String {
    let visible: Vec<&str> = element
        .descendants()
        .filter(|node| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map_or(false, |el| NON_VISIBLE.contains(&el.name()))
            })
        })
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect();
    normalize_whitespace(&visible.join(" "))
}

fn count_in_text(phrase: &str, text: &str) -> Option<Result<ResultCount, ParseError>> {
    let captures = COUNT_PATTERNS.iter().find_map(|pattern| pattern.captures(text))?;

    let raw = captures.get(2).map_or("", |m| m.as_str());
    let open_ended = captures.get(1).is_some() || captures.get(3).is_some();

    let parsed = raw.replace(',', "").parse::<u64>().map_err(|_| ParseError::InvalidNumber {
        phrase: phrase.to_string(),
        raw: raw.to_string(),
    });

    Some(parsed.map(|value| {
        if open_ended {
            ResultCount::at_least(value)
        } else {
            ResultCount::exact(value)
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::HttpFetcher;

    const SEARCH_PAGE: &str = r#"<!doctype html>
        <html><body>
          <div class="s-desktop-toolbar">
            <span data-component-type="s-result-info-bar">
              <div class="a-section a-spacing-small a-spacing-top-small">
                <span>1-16 of 938 results for</span>
                <span class="a-color-state a-text-bold">"bold and easy summer coloring book"</span>
              </div>
            </span>
          </div>
          <div class="sg-col-inner"><span>Sponsored</span></div>
        </body></html>"#;

    #[test]
    fn reads_count_from_info_bar() {
        assert_eq!(
            parse_result_count("p", SEARCH_PAGE).unwrap(),
            ResultCount::exact(938)
        );
    }

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(parse_result_count("p", "10,000 results").unwrap(), ResultCount::exact(10000));
        assert_eq!(parse_result_count("p", "938 results").unwrap(), ResultCount::exact(938));
        assert_eq!(
            parse_result_count("p", "1,234,567 Results").unwrap(),
            ResultCount::exact(1_234_567)
        );
    }

    #[test]
    fn plus_and_over_are_floors() {
        assert_eq!(
            parse_result_count("p", "10,000+ results").unwrap(),
            ResultCount::at_least(10000)
        );
        assert_eq!(
            parse_result_count("p", "1-48 of over 10,000 results for").unwrap(),
            ResultCount::at_least(10000)
        );
        assert_eq!(
            parse_result_count("p", "Showing over 50,000 items").unwrap(),
            ResultCount::at_least(50000)
        );
    }

    #[test]
    fn falls_back_to_product_wording() {
        assert_eq!(parse_result_count("p", "We found 42 products").unwrap(), ResultCount::exact(42));
    }

    #[test]
    fn info_bar_wins_over_body_text() {
        let html = r#"<html><body>
            <p>Customers viewed 5 results today</p>
            <div class="sg-col-inner"><span>1-48 of 1,000 results for</span></div>
        </body></html>"#;
        assert_eq!(parse_result_count("p", html).unwrap(), ResultCount::exact(1000));
    }

    #[test]
    fn missing_count_is_an_error() {
        let err = parse_result_count("captcha", "<html><body>Enter the characters you see below</body></html>")
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::CountNotFound {
                phrase: "captcha".into()
            }
        );
    }

    #[test]
    fn body_fallback_ignores_scripts_and_styles() {
        let html = r#"<html><head><style>.badge::after { content: "over 3"; }</style></head><body>
            <script>window.cfg = { label: "over 5 left", shown: "12 results" };</script>
            <p>Enter the characters you see below</p>
        </body></html>"#;
        assert!(matches!(
            parse_result_count("p", html),
            Err(ParseError::CountNotFound { .. })
        ));

        let html = r#"<html><body>
            <script>var hint = "over 5";</script>
            <p>We found 42 results</p>
        </body></html>"#;
        assert_eq!(parse_result_count("p", html).unwrap(), ResultCount::exact(42));
    }

    #[test]
    fn oversized_numeral_is_an_error() {
        let err = parse_result_count("p", "99,999,999,999,999,999,999 results").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));
    }

    #[test]
    fn search_url_form_encodes_phrase() {
        let config = Arc::new(NicheConfig::default());
        let fetcher = Arc::new(HttpFetcher::new(config.clone()).unwrap());
        let extractor = CountExtractor::new(fetcher, config);

        let url = extractor.search_url("bold & easy").unwrap();
        assert_eq!(url.as_str(), "https://www.amazon.com/s?k=bold+%26+easy");
    }

    #[tokio::test]
    async fn counts_from_search_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/s"))
            .and(query_param("k", "bold and easy summer coloring book"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let config = Arc::new(NicheConfig::for_tests(&server.uri()));
        let fetcher = Arc::new(HttpFetcher::new(config.clone()).unwrap());
        let extractor = CountExtractor::new(fetcher, config);

        let count = extractor
            .count_for("bold and easy summer coloring book")
            .await
            .unwrap();
        assert_eq!(count, ResultCount::exact(938));
    }

    #[tokio::test]
    async fn fetch_failures_propagate() {
        let server = MockServer::start().await;
        Mock::given(path("/s"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let config = Arc::new(NicheConfig::for_tests(&server.uri()));
        let fetcher = Arc::new(HttpFetcher::new(config.clone()).unwrap());
        let extractor = CountExtractor::new(fetcher, config);

        let err = extractor.count_for("anything").await.unwrap_err();
        assert!(matches!(err, ExtractError::Fetch(FetchError::Status { status: 403, .. })));
    }
}
