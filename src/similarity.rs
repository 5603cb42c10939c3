//! Structural similarity between two fingerprint lists.

use std::collections::HashSet;

use resource_harvest::reference_path;

/// Jaccard index of the path components of `a` and `b`.
///
/// Entries are trimmed, blank entries are ignored, and only the path of each
/// entry takes part in the comparison, so `http://x/a?b=1` and `/a` are the
/// same key. Two empty inputs are identical (`1.0`); exactly one empty input
/// shares nothing (`0.0`).
///
/// ```
/// use findsim::similarity::similarity;
///
/// let score = similarity(&["/a?x=1", "/b"], &["http://other.example/a", "/c"]);
/// assert!((score - 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn similarity<A, B>(a: &[A], b: &[B]) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let left = path_keys(a);
    let right = path_keys(b);
    match (left.is_empty(), right.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }
    let shared = left.intersection(&right).count();
    let union = left.len() + right.len() - shared;
    shared as f64 / union as f64
}

fn path_keys<S: AsRef<str>>(entries: &[S]) -> HashSet<&str> {
    entries
        .iter()
        .map(|entry| entry.as_ref().trim())
        .filter(|entry| !entry.is_empty())
        .map(reference_path)
        .collect()
}
