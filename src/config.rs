//! Command line, config file and credential resolution.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use url::Url;

use crate::classify::{ProviderKind, DEFAULT_MAX_TOKENS};
use crate::error::ConfigError;
use crate::policy::{ValidationPolicy, NOISE_FLOOR, REJECT_THRESHOLD, SAMPLE_SIZE, VALID_THRESHOLD};
use crate::profiler::FetchSettings;
use crate::report::DEFAULT_LEDGER;
use crate::search::{DEFAULT_FOFA_API, DEFAULT_PAGE_SIZE};
use crate::telemetry::Verbosity;

/// Config file read when `--config` is not given and it exists.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Command-line interface of the `findsim` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "findsim",
    version,
    about = "Extract a site's resources, keep the distinctive ones, and validate them as FOFA fingerprints"
)]
pub struct Cli {
    /// Site to analyze, starting with http:// or https://
    #[arg(short, long, env = "FINDSIM_URL")]
    pub url: String,

    /// Report file (default: fingerprint_<host>.json)
    #[arg(short, long, env = "FINDSIM_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Append-only JSONL ledger of valid fingerprints
    #[arg(long, env = "FINDSIM_LEDGER", default_value = DEFAULT_LEDGER)]
    pub ledger: PathBuf,

    /// Page fetch timeout in seconds
    #[arg(short, long, env = "FINDSIM_TIMEOUT", default_value_t = 10)]
    pub timeout: u64,

    /// Only extract resources and save the raw profile
    #[arg(long, default_value_t = false)]
    pub no_analysis: bool,

    /// Skip favicon hashing and the favicon hash search
    #[arg(long, env = "FINDSIM_SKIP_ICON", default_value_t = false)]
    pub skip_icon: bool,

    /// Verify TLS certificates of analyzed sites
    #[arg(long, env = "FINDSIM_VERIFY_TLS", default_value_t = false)]
    pub verify_tls: bool,

    /// JSON config file holding API credentials
    #[arg(short, long, env = "FINDSIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Classification provider API
    #[arg(long, env = "FINDSIM_LLM_PROVIDER", value_enum, default_value_t = ProviderKind::OpenAi)]
    pub llm_provider: ProviderKind,

    /// API key of the classification provider
    #[arg(long, env = "FINDSIM_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Base URL of the classification provider
    #[arg(long, env = "FINDSIM_LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Model used for classification
    #[arg(long, env = "FINDSIM_LLM_MODEL")]
    pub llm_model: Option<String>,

    /// Completion token budget per classification
    #[arg(long, env = "FINDSIM_LLM_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub llm_max_tokens: usize,

    /// FOFA search endpoint
    #[arg(long, env = "FINDSIM_FOFA_API")]
    pub fofa_api: Option<String>,

    /// FOFA API key
    #[arg(long, env = "FINDSIM_FOFA_KEY", hide_env_values = true)]
    pub fofa_key: Option<String>,

    /// Rows requested per search
    #[arg(long, env = "FINDSIM_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Search request timeout in seconds
    #[arg(long, env = "FINDSIM_SEARCH_TIMEOUT", default_value_t = 60)]
    pub search_timeout: u64,

    /// Hit count at or above which a candidate is rejected
    #[arg(long, env = "FINDSIM_REJECT_THRESHOLD", default_value_t = REJECT_THRESHOLD)]
    pub reject_threshold: usize,

    /// Hits re-visited per candidate
    #[arg(long, env = "FINDSIM_SAMPLE_SIZE", default_value_t = SAMPLE_SIZE)]
    pub sample_size: usize,

    /// Minimum average similarity of a valid fingerprint
    #[arg(long, env = "FINDSIM_VALID_THRESHOLD", default_value_t = VALID_THRESHOLD)]
    pub valid_threshold: f64,

    /// Similarity at or below which a sample is ignored
    #[arg(long, env = "FINDSIM_NOISE_FLOOR", default_value_t = NOISE_FLOOR)]
    pub noise_floor: f64,

    /// Debug logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}

impl Cli {
    /// Rejects targets that are not http(s) URLs.
    pub fn validate_url(&self) -> Result<Url, ConfigError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::InvalidTarget(self.url.clone()));
        }
        Url::parse(&self.url).map_err(|_| ConfigError::InvalidTarget(self.url.clone()))
    }

    /// Validation policy from the override flags.
    pub fn build_policy(&self) -> Result<ValidationPolicy, ConfigError> {
        ValidationPolicy::new(
            self.reject_threshold,
            self.sample_size,
            self.valid_threshold,
            self.noise_floor,
        )
    }

    /// HTTP behavior for site visits.
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.timeout),
            accept_invalid_certs: !self.verify_tls,
            fetch_favicon: !self.skip_icon,
            ..FetchSettings::default()
        }
    }

    /// Search request timeout.
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout)
    }

    /// Log verbosity from `-v` / `-q`.
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

/// Keys accepted in the JSON config file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    /// Classification provider key.
    #[serde(default, alias = "deepseek_api_key")]
    pub llm_api_key: Option<String>,
    /// Classification provider base URL.
    #[serde(default)]
    pub llm_base_url: Option<String>,
    /// Classification model.
    #[serde(default)]
    pub llm_model: Option<String>,
    /// FOFA search endpoint.
    #[serde(default)]
    pub fofa_api: Option<String>,
    /// FOFA API key.
    #[serde(default)]
    pub fofa_api_key: Option<String>,
}

/// Loads `path`, or [`DEFAULT_CONFIG_FILE`] when it exists, or nothing.
pub fn load_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                return Ok(FileConfig::default());
            }
            default
        }
    };
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
}

/// Everything needed to reach the external services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Classification provider key.
    pub llm_api_key: String,
    /// Classification provider base URL override.
    pub llm_base_url: Option<String>,
    /// Classification model override.
    pub llm_model: Option<String>,
    /// FOFA endpoint.
    pub fofa_api: String,
    /// FOFA key.
    pub fofa_key: String,
}

/// Merges CLI/env values over the config file. Missing keys are fatal.
pub fn resolve_credentials(cli: &Cli, file: &FileConfig) -> Result<Credentials, ConfigError> {
    let llm_api_key = pick(&cli.llm_api_key, &file.llm_api_key).ok_or(
        ConfigError::MissingCredential {
            name: "LLM API key",
            flag: "llm-api-key",
            env: "FINDSIM_LLM_API_KEY",
            key: "deepseek_api_key",
        },
    )?;
    let fofa_key = pick(&cli.fofa_key, &file.fofa_api_key).ok_or(
        ConfigError::MissingCredential {
            name: "FOFA API key",
            flag: "fofa-key",
            env: "FINDSIM_FOFA_KEY",
            key: "fofa_api_key",
        },
    )?;
    Ok(Credentials {
        llm_api_key,
        llm_base_url: pick(&cli.llm_base_url, &file.llm_base_url),
        llm_model: pick(&cli.llm_model, &file.llm_model),
        fofa_api: pick(&cli.fofa_api, &file.fofa_api)
            .unwrap_or_else(|| DEFAULT_FOFA_API.to_string()),
        fofa_key,
    })
}

fn pick(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
