//! Paced, retrying HTTP GET.
//!
//! Every request, the first one included, is preceded by a random pause drawn
//! from the configured delay bounds. Transient failures (transport errors,
//! 429, 5xx) are retried with exponential backoff until the retry budget is
//! spent; anything else fails on the spot.

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{self, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

use crate::config::NicheConfig;
use crate::errors::{FetchError, Transient};

/// Source of response bodies. The pipeline only talks to this trait.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
    config: Arc<NicheConfig>,
}

impl HttpFetcher {
    pub fn new(config: Arc<NicheConfig>) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .default_headers(browser_headers())
            .build()?;

        Ok(Self { client, config })
    }

    fn pre_request_delay(&self) -> Duration {
        let (min, max) = self.config.delay_bounds();
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    fn retry_wait(&self, retry: u32, failure: &Transient) -> Duration {
        let backoff = self.config.backoff(retry);
        let cap = Duration::from_millis(self.config.backoff_max_ms);
        match failure.retry_after() {
            Some(secs) => backoff.max(Duration::from_secs(secs)).min(cap),
            None => backoff,
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let target = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let pause = self.pre_request_delay();
            tracing::debug!(url, attempt, attempts, pause_ms = pause.as_millis() as u64, "fetch.start");
            sleep(pause).await;

            let failure = match self.client.get(target.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => {
                                tracing::debug!(url, attempt, status = status.as_u16(), bytes = body.len(), "fetch.ok");
                                return Ok(body);
                            }
                            Err(e) => Transient::from_reqwest(&e),
                        }
                    } else {
                        let retry_after = parse_retry_after(response.headers());
                        match Transient::from_status(status.as_u16(), retry_after) {
                            Some(transient) => transient,
                            None => {
                                tracing::warn!(url, attempt, status = status.as_u16(), "fetch.rejected");
                                return Err(FetchError::Status {
                                    url: url.to_string(),
                                    status: status.as_u16(),
                                });
                            }
                        }
                    }
                }
                Err(e) if e.is_builder() => {
                    tracing::warn!(url, error = %e, "fetch.build_failed");
                    return Err(FetchError::Build {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => Transient::from_reqwest(&e),
            };

            if attempt >= attempts {
                tracing::error!(url, attempts, reason = %failure, "fetch.exhausted");
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts,
                    last: failure,
                });
            }

            let wait = self.retry_wait(attempt, &failure);
            tracing::warn!(
                url,
                attempt,
                attempts,
                backoff_ms = wait.as_millis() as u64,
                reason = %failure,
                "fetch.retrying"
            );
            sleep(wait).await;
        }
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(header::REFERER, HeaderValue::from_static("https://www.amazon.com/"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-site"));
    headers
}

/// Only the delta-seconds form is honoured; HTTP dates are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
