//! Error taxonomy for the fingerprint pipeline.
//!
//! Transport and classification failures are recoverable: callers convert them
//! into "this data point does not exist" at the smallest scope. Only
//! [`ConfigError`] stops a run, and it does so before any site is processed.

use std::path::PathBuf;

use resource_harvest::StreamError;
use thiserror::Error;

/// A search or page request failed (timeout, non-2xx, malformed body).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The per-target HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },
    /// The response body did not have the expected shape.
    #[error("malformed response from {url}: {reason}")]
    Malformed {
        /// Requested URL.
        url: String,
        /// What was wrong with the body.
        reason: String,
    },
    /// The search API accepted the request but reported an error.
    #[error("search api rejected query: {0}")]
    Oracle(String),
    /// A target or endpoint URL could not be parsed.
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        /// Offending input.
        url: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// Streaming the page body through the HTML harvester failed.
    #[error("failed to read page {url}: {source}")]
    Html {
        /// Page URL.
        url: String,
        /// Streaming failure.
        #[source]
        source: HtmlStreamError,
    },
}

impl FetchError {
    pub(crate) fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }
}

/// Errors surfaced while streaming a response body into the harvester.
#[derive(Debug, Error)]
pub enum HtmlStreamError {
    /// Reading the response stream failed.
    #[error("http stream error: {0}")]
    Http(#[source] reqwest::Error),
    /// The harvester rejected the markup.
    #[error(transparent)]
    Harvest(#[from] StreamError),
}

/// The classification oracle returned nothing usable.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The provider could not be reached.
    #[error("{provider} request failed: {source}")]
    Transport {
        /// Provider name.
        provider: &'static str,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The provider answered with a non-success status.
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        /// Provider name.
        provider: &'static str,
        /// Response status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The provider answered without any text content.
    #[error("{provider} response had no text content")]
    EmptyReply {
        /// Provider name.
        provider: &'static str,
    },
    /// The reply could not be parsed as the fingerprint JSON contract.
    #[error("unparseable classification reply: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The API key cannot be sent as a header.
    #[error("invalid {provider} api key")]
    InvalidKey {
        /// Provider name.
        provider: &'static str,
    },
}

/// Why a single cross-validation sample produced no score.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The hit target could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The hit target's profile could not be classified.
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// Fatal configuration problems detected before the pipeline starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required external-service credential is missing.
    #[error("missing {name}: pass --{flag}, set {env}, or add \"{key}\" to the config file")]
    MissingCredential {
        /// Human readable credential name.
        name: &'static str,
        /// CLI flag providing it.
        flag: &'static str,
        /// Environment variable providing it.
        env: &'static str,
        /// Config file key providing it.
        key: &'static str,
    },
    /// The target URL is not an http(s) URL.
    #[error("url must start with http:// or https://, got {0}")]
    InvalidTarget(String),
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid JSON.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// A policy override is out of range.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}
