#![warn(missing_docs)]
//! Discover distinctive resource fingerprints of a web application and
//! validate them against sites found through a search engine.

pub mod classify;
pub mod config;
pub mod error;
pub mod expand;
pub mod favicon;
pub mod html;
pub mod pipeline;
pub mod policy;
pub mod profile;
pub mod profiler;
pub mod rank;
pub mod report;
pub mod runtime;
pub mod search;
pub mod similarity;
pub mod telemetry;
pub mod validate;

pub use classify::{
    AnyProvider, ClassificationResult, Classifier, LlmClassifier, LlmProvider, ProviderKind,
};
pub use config::{Cli, Credentials, FileConfig};
pub use error::{ClassifyError, ConfigError, FetchError, HtmlStreamError, SampleError};
pub use expand::expand;
pub use pipeline::{Pipeline, ProfilingClassifier};
pub use policy::ValidationPolicy;
pub use profile::{CandidateOrigin, CandidateSet, FingerprintCandidate, ResourceProfile};
pub use profiler::{FetchSettings, Profiler, SiteProfiler};
pub use rank::{filter_and_rank, RankedCandidate};
pub use report::{IconCheck, SiteReport, ValidFingerprint};
pub use runtime::run;
pub use search::{FofaClient, SearchGateway, SearchHit, SearchOracle, SearchRow};
pub use similarity::similarity;
pub use validate::{validate, SiteClassifier, ValidationRecord, Verdict};
