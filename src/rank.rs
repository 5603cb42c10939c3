//! Hit-count specificity gate and rarest-first ordering.

use serde::Serialize;
use tracing::{debug, info};

use crate::policy::ValidationPolicy;
use crate::profile::FingerprintCandidate;
use crate::search::{SearchGateway, SearchHit, SearchOracle};

/// A candidate that passed the hit-count gate, with its hit sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCandidate {
    /// The candidate that was searched.
    pub candidate: FingerprintCandidate,
    /// Number of rows the oracle returned.
    pub hit_count: usize,
    /// Prefix of the hits chosen for cross-validation.
    pub sampled_hits: Vec<SearchHit>,
}

/// First `sample_size` hits, minus placeholder hosts.
pub fn sample_hits(hits: &[SearchHit], sample_size: usize) -> Vec<SearchHit> {
    hits.iter()
        .take(sample_size)
        .filter(|hit| !hit.is_placeholder())
        .cloned()
        .collect()
}

/// Queries each candidate once, drops those outside the specificity window,
/// and orders the rest by ascending hit count.
///
/// Ties keep the candidate order. Queries run one at a time.
pub async fn filter_and_rank<O, I>(
    candidates: I,
    gateway: &SearchGateway<O>,
    policy: &ValidationPolicy,
) -> Vec<RankedCandidate>
where
    O: SearchOracle,
    I: IntoIterator<Item = FingerprintCandidate>,
{
    let mut ranked = Vec::new();
    for candidate in candidates {
        let hits = gateway.query(&candidate.value).await;
        let hit_count = hits.len();
        if hit_count == 0 {
            info!(candidate = %candidate.value, "no hits; dropping candidate");
            continue;
        }
        if !policy.accepts_hit_count(hit_count) {
            info!(
                candidate = %candidate.value,
                hit_count,
                limit = policy.reject_threshold(),
                "too many hits; dropping candidate"
            );
            continue;
        }
        let sampled_hits = sample_hits(&hits, policy.sample_size());
        info!(
            candidate = %candidate.value,
            hit_count,
            sampled = sampled_hits.len(),
            "candidate hit"
        );
        ranked.push(RankedCandidate {
            candidate,
            hit_count,
            sampled_hits,
        });
    }
    ranked.sort_by_key(|entry| entry.hit_count);
    debug!(survivors = ranked.len(), "ranking complete");
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::search::SearchRow;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Answers `body="<value>"` with a fixed number of generated rows.
    struct CountingOracle {
        counts: HashMap<String, usize>,
    }

    impl CountingOracle {
        fn new(counts: &[(&str, usize)]) -> Self {
            Self {
                counts: counts
                    .iter()
                    .map(|(value, count)| (format!("body=\"{value}\""), *count))
                    .collect(),
            }
        }
    }

    impl SearchOracle for CountingOracle {
        async fn search(&self, query: &str) -> Result<Vec<SearchRow>, FetchError> {
            let Some(count) = self.counts.get(query) else {
                return Err(FetchError::Oracle("unexpected query".to_string()));
            };
            Ok((0..*count)
                .map(|idx| SearchRow::new(format!("198.51.100.{}", idx % 250 + 1), "http"))
                .collect())
        }
    }

    fn candidates(values: &[&str]) -> Vec<FingerprintCandidate> {
        values.iter().map(|value| FingerprintCandidate::oracle(*value)).collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_zero_and_generic_candidates() {
        let gateway = SearchGateway::new(CountingOracle::new(&[
            ("/none.js", 0),
            ("/generic.js", 5000),
            ("/rare.js", 4999),
        ]));
        let ranked = filter_and_rank(
            candidates(&["/none.js", "/generic.js", "/rare.js"]),
            &gateway,
            &ValidationPolicy::default(),
        )
        .await;

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate.value, "/rare.js");
        assert_eq!(ranked[0].hit_count, 4999);
        assert_eq!(ranked[0].sampled_hits.len(), 10);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sorts_rarest_first_and_keeps_ties_stable() {
        let gateway = SearchGateway::new(CountingOracle::new(&[
            ("/a.js", 40),
            ("/b.js", 3),
            ("/c.js", 40),
            ("/d.js", 7),
        ]));
        let ranked = filter_and_rank(
            candidates(&["/a.js", "/b.js", "/c.js", "/d.js"]),
            &gateway,
            &ValidationPolicy::default(),
        )
        .await;

        let order: Vec<(&str, usize)> = ranked
            .iter()
            .map(|entry| (entry.candidate.value.as_str(), entry.hit_count))
            .collect();
        assert_eq!(order, vec![("/b.js", 3), ("/d.js", 7), ("/a.js", 40), ("/c.js", 40)]);
        assert_eq!(ranked[0].sampled_hits.len(), 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_queries_count_as_zero_hits() {
        let gateway = SearchGateway::new(CountingOracle::new(&[]));
        let ranked = filter_and_rank(
            candidates(&["/unknown.js"]),
            &gateway,
            &ValidationPolicy::default(),
        )
        .await;
        assert!(ranked.is_empty());
    }

    #[test]
    fn sample_takes_prefix_and_skips_placeholders() {
        let hits: Vec<SearchHit> = [
            ("0.0.0.0", "http"),
            ("192.0.2.1", "http"),
            ("192.0.2.2", "https"),
            ("192.0.2.3", "http"),
        ]
        .into_iter()
        .map(|(host, scheme)| SearchHit::from_row(SearchRow::new(host, scheme)))
        .collect();

        assert_eq!(
            sample_hits(&hits, 3),
            vec![
                SearchHit::new("http://192.0.2.1"),
                SearchHit::new("https://192.0.2.2"),
            ]
        );
    }
}
