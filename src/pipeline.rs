//! Per-site orchestration of classification, expansion, ranking and
//! cross-validation.

use tracing::{info, warn};

use crate::classify::Classifier;
use crate::error::{FetchError, SampleError};
use crate::expand::expand;
use crate::policy::ValidationPolicy;
use crate::profile::{CandidateSet, ResourceProfile};
use crate::profiler::Profiler;
use crate::rank::{filter_and_rank, sample_hits};
use crate::report::{IconCheck, SiteReport};
use crate::search::{build_query, QueryKind, SearchGateway, SearchOracle};
use crate::validate::{validate, SiteClassifier};

/// Runs the fingerprint pipeline with explicitly supplied collaborators.
pub struct Pipeline<P, C, O> {
    profiler: P,
    classifier: C,
    gateway: SearchGateway<O>,
    policy: ValidationPolicy,
    icon_check: bool,
}

impl<P, C, O> Pipeline<P, C, O>
where
    P: Profiler,
    C: Classifier,
    O: SearchOracle,
{
    /// Assembles a pipeline. The favicon hash check is enabled.
    pub fn new(profiler: P, classifier: C, oracle: O, policy: ValidationPolicy) -> Self {
        Self {
            profiler,
            classifier,
            gateway: SearchGateway::new(oracle),
            policy,
            icon_check: true,
        }
    }

    /// Enables or disables the single-shot favicon hash search.
    pub fn with_icon_check(mut self, enabled: bool) -> Self {
        self.icon_check = enabled;
        self
    }

    /// Profiles `site_url` and analyzes it.
    ///
    /// Only a failure to fetch the site itself is an error; every later
    /// failure shrinks the report instead.
    pub async fn analyze(&self, site_url: &str) -> Result<SiteReport, FetchError> {
        let profile = self.profiler.profile(site_url).await?;
        Ok(self.analyze_profile(profile).await)
    }

    /// Analyzes an existing profile.
    pub async fn analyze_profile(&self, profile: ResourceProfile) -> SiteReport {
        let fingerprints = match self.classifier.classify(&profile).await {
            Ok(result) => result.fingerprints,
            Err(err) => {
                warn!(
                    site = %profile.site_url,
                    error = %err,
                    "classification failed; no candidates"
                );
                Vec::new()
            }
        };

        let expanded = expand(&fingerprints);
        let candidates = CandidateSet::from_expansion(&fingerprints, &expanded);
        info!(
            site = %profile.site_url,
            oracle = fingerprints.len(),
            expanded = candidates.len(),
            "candidates ready"
        );

        let icon_check = match (self.icon_check, profile.favicon_hash.as_deref()) {
            (true, Some(hash)) => Some(self.check_icon(hash).await),
            _ => None,
        };

        let expanded_candidates = candidates.values();
        if candidates.is_empty() {
            info!(site = %profile.site_url, "nothing to search for");
        }
        let ranked = filter_and_rank(candidates.into_vec(), &self.gateway, &self.policy).await;
        info!(site = %profile.site_url, survivors = ranked.len(), "ranking done");

        let revisit = ProfilingClassifier::new(&self.profiler, &self.classifier);
        let records = validate(&fingerprints, ranked, &revisit, &self.policy).await;

        let report = SiteReport::assemble(
            &profile,
            fingerprints,
            expanded_candidates,
            icon_check,
            records,
        );
        info!(
            site = %report.url,
            valid = report.valid_fingerprints.len(),
            "analysis complete"
        );
        report
    }

    async fn check_icon(&self, hash: &str) -> IconCheck {
        let hits = self.gateway.query_icon(hash).await;
        let hit_count = hits.len();
        let distinctive = self.policy.accepts_hit_count(hit_count);
        info!(hash, hit_count, distinctive, "favicon hash checked");
        IconCheck {
            hash: hash.to_string(),
            query: build_query(QueryKind::IconHash, hash),
            hit_count,
            distinctive,
            sampled_hits: sample_hits(&hits, self.policy.sample_size()),
        }
    }
}

/// Re-visits a hit site: profile it, then classify the profile.
pub struct ProfilingClassifier<'a, P, C> {
    profiler: &'a P,
    classifier: &'a C,
}

impl<'a, P, C> ProfilingClassifier<'a, P, C> {
    /// Borrows the collaborators used for re-visits.
    pub fn new(profiler: &'a P, classifier: &'a C) -> Self {
        Self {
            profiler,
            classifier,
        }
    }
}

impl<P: Profiler, C: Classifier> SiteClassifier for ProfilingClassifier<'_, P, C> {
    async fn fingerprints_for(&self, target_url: &str) -> Result<Vec<String>, SampleError> {
        let profile = self.profiler.profile(target_url).await?;
        let result = self.classifier.classify(&profile).await?;
        Ok(result.fingerprints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationResult;
    use crate::error::ClassifyError;
    use crate::search::SearchRow;
    use crate::validate::Verdict;
    use pretty_assertions::assert_eq;
    use resource_harvest::ResourceSet;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const ORIGIN: &str = "http://app.example.test";

    /// Sites are described by the fingerprints the oracle will return for
    /// them; the profile itself only carries the site URL.
    struct FakeWeb {
        reachable: Vec<&'static str>,
        visits: RefCell<Vec<String>>,
    }

    impl Profiler for FakeWeb {
        async fn profile(&self, target_url: &str) -> Result<ResourceProfile, FetchError> {
            self.visits.borrow_mut().push(target_url.to_string());
            if !self.reachable.iter().any(|url| *url == target_url) {
                return Err(FetchError::Status {
                    url: target_url.to_string(),
                    status: 502,
                });
            }
            Ok(ResourceProfile::new(
                target_url,
                (target_url == ORIGIN).then(|| "-1373285829".to_string()),
                ResourceSet::default(),
            ))
        }
    }

    struct FakeOracle {
        answers: HashMap<&'static str, Vec<&'static str>>,
    }

    impl Classifier for FakeOracle {
        async fn classify(
            &self,
            profile: &ResourceProfile,
        ) -> Result<ClassificationResult, ClassifyError> {
            let fingerprints = self
                .answers
                .get(profile.site_url.as_str())
                .map(|values| values.iter().map(|value| value.to_string()).collect())
                .unwrap_or_default();
            Ok(ClassificationResult {
                favicon_hash: profile.favicon_hash.clone(),
                fingerprints,
            })
        }
    }

    struct FakeSearch {
        rows: HashMap<String, Vec<SearchRow>>,
    }

    impl SearchOracle for FakeSearch {
        async fn search(&self, query: &str) -> Result<Vec<SearchRow>, FetchError> {
            Ok(self.rows.get(query).cloned().unwrap_or_default())
        }
    }

    fn pipeline() -> Pipeline<FakeWeb, FakeOracle, FakeSearch> {
        let profiler = FakeWeb {
            reachable: vec![ORIGIN, "http://192.0.2.11", "https://192.0.2.12"],
            visits: RefCell::new(Vec::new()),
        };
        let classifier = FakeOracle {
            answers: HashMap::from([
                (ORIGIN, vec!["/static/custom.js", "/a", "/b"]),
                // 3 shared of 5 distinct paths.
                ("http://192.0.2.11", vec!["/static/custom.js", "/a", "/b", "/c", "/d"]),
                // 2 shared of 4 distinct paths.
                ("https://192.0.2.12", vec!["/static/custom.js", "/a", "/e"]),
            ]),
        };
        let search = FakeSearch {
            rows: HashMap::from([
                (
                    "body=\"/static/custom.js\"".to_string(),
                    vec![
                        SearchRow::new("192.0.2.11", "http"),
                        SearchRow::new("192.0.2.12", "https"),
                        SearchRow::new("192.0.2.13", "http"),
                    ],
                ),
                (
                    "icon_hash=\"-1373285829\"".to_string(),
                    vec![SearchRow::new("192.0.2.11", "http")],
                ),
            ]),
        };
        Pipeline::new(profiler, classifier, search, ValidationPolicy::default())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn end_to_end_single_candidate() {
        let pipeline = pipeline();
        let report = pipeline.analyze(ORIGIN).await.unwrap();

        assert_eq!(report.fingerprints, vec!["/static/custom.js", "/a", "/b"]);
        assert_eq!(
            report.expanded_candidates,
            vec!["/static/custom.js", "/a", "/b", "custom.js"]
        );

        // Only the full path has hits; "/a", "/b" and "custom.js" find nothing.
        assert_eq!(report.validations.len(), 1);
        let record = &report.validations[0];
        assert_eq!(record.hit_count, 3);
        assert_eq!(record.similarity_scores, vec![0.6, 0.5]);
        assert!((record.average_similarity - 0.55).abs() < 1e-12);
        assert_eq!(record.verdict, Verdict::Valid);

        assert_eq!(report.valid_fingerprints.len(), 1);
        assert_eq!(report.valid_fingerprints[0].fingerprint, "/static/custom.js");
        assert_eq!(report.valid_fingerprints[0].hit_count, 3);

        let icon = report.icon_check.as_ref().unwrap();
        assert_eq!(icon.hit_count, 1);
        assert!(icon.distinctive);

        assert_eq!(
            pipeline.profiler.visits.borrow().clone(),
            vec![
                ORIGIN.to_string(),
                "http://192.0.2.11".to_string(),
                "https://192.0.2.12".to_string(),
                "http://192.0.2.13".to_string(),
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unreachable_site_is_an_error() {
        let pipeline = pipeline().with_icon_check(false);
        assert!(matches!(
            pipeline.analyze("http://192.0.2.99").await,
            Err(FetchError::Status { status: 502, .. })
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn site_without_candidates_still_reports() {
        let pipeline = pipeline().with_icon_check(false);
        let profile = ResourceProfile::new("http://192.0.2.50", None, ResourceSet::default());
        let report = pipeline.analyze_profile(profile).await;

        assert!(report.fingerprints.is_empty());
        assert!(report.validations.is_empty());
        assert!(report.valid_fingerprints.is_empty());
        assert_eq!(report.icon_check, None);
    }
}
