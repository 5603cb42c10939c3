//! Thresholds that decide which candidates are worth validating and which
//! validations count.

use crate::error::ConfigError;

/// Hit count at or above which a candidate is too common to identify anything.
pub const REJECT_THRESHOLD: usize = 5000;
/// Number of hits re-visited per candidate.
pub const SAMPLE_SIZE: usize = 10;
/// Minimum average similarity for a valid fingerprint (inclusive).
pub const VALID_THRESHOLD: f64 = 0.4;
/// Similarity scores at or below this are dropped as unrelated sites.
pub const NOISE_FLOOR: f64 = 0.1;

/// Tunable knobs for ranking and cross-validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValidationPolicy {
    reject_threshold: usize,
    sample_size: usize,
    valid_threshold: f64,
    noise_floor: f64,
}

impl ValidationPolicy {
    /// Constructs a policy, rejecting values that would make every verdict
    /// meaningless.
    pub fn new(
        reject_threshold: usize,
        sample_size: usize,
        valid_threshold: f64,
        noise_floor: f64,
    ) -> Result<Self, ConfigError> {
        if reject_threshold == 0 {
            return Err(ConfigError::InvalidPolicy(
                "reject threshold must be at least 1".to_string(),
            ));
        }
        if sample_size == 0 {
            return Err(ConfigError::InvalidPolicy(
                "sample size must be at least 1".to_string(),
            ));
        }
        for (name, value) in [("valid threshold", valid_threshold), ("noise floor", noise_floor)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidPolicy(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(Self {
            reject_threshold,
            sample_size,
            valid_threshold,
            noise_floor,
        })
    }

    /// Hit count at or above which candidates are rejected.
    pub fn reject_threshold(&self) -> usize {
        self.reject_threshold
    }

    /// Maximum number of hits sampled per candidate.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Inclusive lower bound on the average similarity of a valid candidate.
    pub fn valid_threshold(&self) -> f64 {
        self.valid_threshold
    }

    /// Exclusive lower bound on a recorded similarity score.
    pub fn noise_floor(&self) -> f64 {
        self.noise_floor
    }

    /// True when `hit_count` is inside the specificity window `(0, reject)`.
    pub fn accepts_hit_count(&self, hit_count: usize) -> bool {
        hit_count > 0 && hit_count < self.reject_threshold
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            reject_threshold: REJECT_THRESHOLD,
            sample_size: SAMPLE_SIZE,
            valid_threshold: VALID_THRESHOLD,
            noise_floor: NOISE_FLOOR,
        }
    }
}
