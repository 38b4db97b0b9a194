use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;

pub const DEFAULT_SEED: &str = "coloring book for";

/// Run-wide settings. Built once at startup and passed down read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NicheConfig {
    /// Phrases with strictly fewer results than this are reported.
    pub threshold: u64,
    /// Retries after the first attempt; a fetch makes at most `max_retries + 1` requests.
    pub max_retries: u32,
    /// Lower bound of the random pause before each request, in seconds.
    pub delay_min: f64,
    /// Upper bound of the random pause before each request, in seconds.
    pub delay_max: f64,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub suggestion_url: String,
    pub search_url: String,
    pub suggestion_limit: u32,
    pub search_alias: String,
    pub marketplace_id: String,
}

impl Default for NicheConfig {
    fn default() -> Self {
        Self {
            threshold: 2000,
            max_retries: 3,
            delay_min: 2.0,
            delay_max: 7.0,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36".to_string(),
            timeout_seconds: 10,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
            suggestion_url: "https://completion.amazon.com/api/2017/suggestions".to_string(),
            search_url: "https://www.amazon.com/s".to_string(),
            suggestion_limit: 11,
            search_alias: "stripbooks".to_string(),
            marketplace_id: "ATVPDKIKX0DER".to_string(),
        }
    }
}

impl NicheConfig {
    /// Load a JSON config file. Keys left out keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("delay_min", self.delay_min), ("delay_max", self.delay_max)] {
            if value < 0.0 || Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be a non-negative number of seconds, got {}", value),
                ));
            }
        }
        if self.delay_min > self.delay_max {
            return Err(ConfigError::invalid(
                "delay_min",
                format!(
                    "{} is greater than delay_max {}",
                    self.delay_min, self.delay_max
                ),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::invalid("timeout_seconds", "must be at least 1"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::invalid("user_agent", "must not be empty"));
        }
        for (field, value) in [
            ("suggestion_url", &self.suggestion_url),
            ("search_url", &self.search_url),
        ] {
            let parsed =
                Url::parse(value).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::invalid(
                    field,
                    format!("unsupported scheme '{}'", parsed.scheme()),
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Pause bounds as durations. Out-of-range values saturate; `validate`
    /// rejects them before a run starts.
    pub fn delay_bounds(&self) -> (Duration, Duration) {
        let seconds = |value: f64| {
            Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
                Duration::MAX
            } else {
                Duration::ZERO
            })
        };
        (seconds(self.delay_min), seconds(self.delay_max))
    }

    /// Wait before retry number `retry` (1-based), without any server hint.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(20);
        let ms = self
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }

    /// Settings with no pacing or backoff, for tests against local servers.
    #[cfg(test)]
    pub fn for_tests(base: &str) -> Self {
        Self {
            delay_min: 0.0,
            delay_max: 0.0,
            backoff_base_ms: 0,
            backoff_max_ms: 0,
            timeout_seconds: 5,
            suggestion_url: format!("{}/api/2017/suggestions", base),
            search_url: format!("{}/s", base),
            ..Self::default()
        }
    }
}
