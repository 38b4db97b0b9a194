use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single logical fetch, after the retry budget was applied.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Invalid URL: {url} - {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Request could not be built: {url} - {message}")]
    Build { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Transient,
    },
}

/// Failures worth another attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Transient {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited (HTTP 429)")]
    RateLimited { retry_after: Option<u64> },

    #[error("server error (HTTP {0})")]
    Server(u16),
}

impl Transient {
    pub fn from_status(status: u16, retry_after: Option<u64>) -> Option<Self> {
        match status {
            429 => Some(Self::RateLimited { retry_after }),
            500..=599 => Some(Self::Server(status)),
            _ => None,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// Server-requested wait, in seconds.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidUrl { url, .. }
            | Self::Build { url, .. }
            | Self::Status { url, .. }
            | Self::Exhausted { url, .. } => url,
        }
    }

    /// True when the retry budget ran out on connection failures, i.e. the
    /// network itself is likely gone.
    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            Self::Exhausted {
                last: Transient::Connect(_),
                ..
            }
        )
    }
}

/// The response arrived but did not have the expected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed JSON from {url}: {message}")]
    Json { url: String, message: String },

    #[error("No result count found for '{phrase}'")]
    CountNotFound { phrase: String },

    #[error("Result count '{raw}' for '{phrase}' is not a number")]
    InvalidNumber { phrase: String, raw: String },
}

/// Why a candidate phrase could not be counted.
#[derive(Error, Debug, Clone)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ExtractError {
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Fetch(err) if err.is_connect())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not decode config {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {field} - {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
