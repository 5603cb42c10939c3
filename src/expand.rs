//! Candidate expansion.
//!
//! A full resource path is often rewritten or proxied on other deployments of
//! the same application while the bare filename survives, so every
//! multi-segment path also contributes its final segment. Query strings,
//! fragments and the host of absolute URLs never contribute.

use resource_harvest::reference_path;

/// Returns `candidates` deduplicated, followed by new final path segments.
///
/// ```
/// use findsim::expand::expand;
///
/// assert_eq!(expand(&["/js/app.js"]), vec!["/js/app.js", "app.js"]);
/// assert_eq!(expand(&["/app.js"]), vec!["/app.js"]);
/// ```
pub fn expand<S: AsRef<str>>(candidates: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(candidates.len() * 2);
    for candidate in candidates {
        push_unique(&mut out, candidate.as_ref());
    }
    for candidate in candidates {
        if let Some(segment) = final_segment(candidate.as_ref()) {
            push_unique(&mut out, segment);
        }
    }
    out
}

/// Final segment of a multi-segment path, if it would add something new.
fn final_segment(candidate: &str) -> Option<&str> {
    let (head, segment) = reference_path(candidate).rsplit_once('/')?;
    if head.is_empty() || segment.is_empty() {
        return None;
    }
    Some(segment)
}

fn push_unique(out: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !out.iter().any(|seen| seen == value) {
        out.push(value.to_string());
    }
}
