//! Site profiles and fingerprint candidates.

use resource_harvest::ResourceSet;
use serde::{Deserialize, Serialize};

/// What the pipeline knows about one site before classification.
///
/// Produced once per site by a [`Profiler`](crate::profiler::Profiler) and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceProfile {
    /// Root URL the profile was taken from.
    pub site_url: String,
    /// Decimal MurmurHash3 of the favicon, when one could be fetched.
    pub favicon_hash: Option<String>,
    /// Deduplicated path components of every reference, `src` first.
    pub resource_paths: Vec<String>,
    /// Normalized `src` references in document order.
    pub srcs: Vec<String>,
    /// Normalized `href` references in document order.
    pub hrefs: Vec<String>,
}

impl ResourceProfile {
    /// Builds a profile from a harvested resource set.
    pub fn new(
        site_url: impl Into<String>,
        favicon_hash: Option<String>,
        resources: ResourceSet,
    ) -> Self {
        let resource_paths = resources.paths();
        let ResourceSet { srcs, hrefs, .. } = resources;
        Self {
            site_url: site_url.into(),
            favicon_hash,
            resource_paths,
            srcs,
            hrefs,
        }
    }

    /// Total number of raw references.
    pub fn reference_count(&self) -> usize {
        self.srcs.len() + self.hrefs.len()
    }
}

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Returned by the classification oracle.
    Oracle,
    /// Derived from an oracle candidate by the expander.
    Derived,
}

/// A resource path or filename believed to identify the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintCandidate {
    /// Path, filename or URL fragment searched for.
    pub value: String,
    /// Provenance of the value.
    pub origin: CandidateOrigin,
}

impl FingerprintCandidate {
    /// Candidate returned by the classification oracle.
    pub fn oracle(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin: CandidateOrigin::Oracle,
        }
    }

    /// Candidate derived by expansion.
    pub fn derived(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin: CandidateOrigin::Derived,
        }
    }
}

/// Candidates keyed by value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    entries: Vec<FingerprintCandidate>,
}

impl CandidateSet {
    /// Inserts `candidate` unless its value is already present.
    pub fn insert(&mut self, candidate: FingerprintCandidate) -> bool {
        if self.contains(&candidate.value) {
            return false;
        }
        self.entries.push(candidate);
        true
    }

    /// True when a candidate with `value` exists.
    pub fn contains(&self, value: &str) -> bool {
        self.entries.iter().any(|entry| entry.value == value)
    }

    /// Builds the set from the oracle list and its expansion.
    ///
    /// Values present in `oracle` keep the oracle origin; the rest of
    /// `expanded` is marked as derived.
    pub fn from_expansion(oracle: &[String], expanded: &[String]) -> Self {
        let mut set = Self::default();
        for value in oracle {
            set.insert(FingerprintCandidate::oracle(value.as_str()));
        }
        for value in expanded {
            set.insert(FingerprintCandidate::derived(value.as_str()));
        }
        set
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the set holds no candidate.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidate values in insertion order.
    pub fn values(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.value.clone()).collect()
    }

    /// Consumes the set, yielding candidates in insertion order.
    pub fn into_vec(self) -> Vec<FingerprintCandidate> {
        self.entries
    }
}
