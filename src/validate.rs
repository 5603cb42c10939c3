//! Cross-validation of ranked candidates against sampled hit sites.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SampleError;
use crate::policy::ValidationPolicy;
use crate::profile::FingerprintCandidate;
use crate::rank::RankedCandidate;
use crate::search::SearchHit;
use crate::similarity::similarity;

/// Absolute slack applied when comparing an average against the threshold.
const SCORE_TOLERANCE: f64 = 1e-9;

/// Re-profiles and re-classifies another site.
#[allow(async_fn_in_trait)]
pub trait SiteClassifier {
    /// Fingerprints the classification oracle reports for `target_url`.
    async fn fingerprints_for(&self, target_url: &str) -> Result<Vec<String>, SampleError>;
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Hit sites look like the original site.
    Valid,
    /// Hit sites were reachable but unrelated.
    Invalid,
    /// No sample produced a usable score.
    Inconclusive,
}

/// Cross-validation result for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRecord {
    /// Candidate that was validated.
    pub candidate: FingerprintCandidate,
    /// Hit count observed while ranking.
    pub hit_count: usize,
    /// Hits that were re-visited.
    pub sampled_hits: Vec<SearchHit>,
    /// Scores above the noise floor, in sample order.
    pub similarity_scores: Vec<f64>,
    /// Mean of `similarity_scores`, `0.0` when there are none.
    pub average_similarity: f64,
    /// Final verdict.
    pub verdict: Verdict,
}

impl ValidationRecord {
    /// True when the record belongs in the valid-fingerprint report.
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }
}

/// Averages recorded scores and applies the validity threshold.
pub fn summarize(scores: &[f64], policy: &ValidationPolicy) -> (f64, Verdict) {
    if scores.is_empty() {
        return (0.0, Verdict::Inconclusive);
    }
    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    let verdict = if average + SCORE_TOLERANCE >= policy.valid_threshold() {
        Verdict::Valid
    } else {
        Verdict::Invalid
    };
    (average, verdict)
}

/// Validates every ranked candidate in order.
///
/// A sample whose classification fails is skipped rather than scored as zero,
/// and scores at or below the noise floor are dropped.
pub async fn validate<C: SiteClassifier>(
    original_fingerprints: &[String],
    ranked: Vec<RankedCandidate>,
    classifier: &C,
    policy: &ValidationPolicy,
) -> Vec<ValidationRecord> {
    let mut records = Vec::with_capacity(ranked.len());
    for entry in ranked {
        let record = validate_candidate(original_fingerprints, entry, classifier, policy).await;
        records.push(record);
    }
    records
}

async fn validate_candidate<C: SiteClassifier>(
    original_fingerprints: &[String],
    entry: RankedCandidate,
    classifier: &C,
    policy: &ValidationPolicy,
) -> ValidationRecord {
    let RankedCandidate {
        candidate,
        hit_count,
        sampled_hits,
    } = entry;

    let mut scores = Vec::with_capacity(sampled_hits.len());
    for hit in &sampled_hits {
        let fingerprints = match classifier.fingerprints_for(&hit.target_url).await {
            Ok(fingerprints) => fingerprints,
            Err(err) => {
                warn!(
                    candidate = %candidate.value,
                    target = %hit.target_url,
                    error = %err,
                    "skipping sample"
                );
                continue;
            }
        };
        let score = similarity(original_fingerprints, &fingerprints);
        if score > policy.noise_floor() {
            debug!(candidate = %candidate.value, target = %hit.target_url, score, "sample scored");
            scores.push(score);
        } else {
            debug!(
                candidate = %candidate.value,
                target = %hit.target_url,
                score,
                "sample below noise floor"
            );
        }
    }

    let (average_similarity, verdict) = summarize(&scores, policy);
    match verdict {
        Verdict::Valid => info!(
            candidate = %candidate.value,
            hit_count,
            average = format_args!("{average_similarity:.2}"),
            "valid fingerprint"
        ),
        Verdict::Invalid => info!(
            candidate = %candidate.value,
            hit_count,
            average = format_args!("{average_similarity:.2}"),
            "fingerprint rejected by similarity"
        ),
        Verdict::Inconclusive => info!(
            candidate = %candidate.value,
            hit_count,
            "no usable samples; fingerprint unproven"
        ),
    }

    ValidationRecord {
        candidate,
        hit_count,
        sampled_hits,
        similarity_scores: scores,
        average_similarity,
        verdict,
    }
}
