//! Site reports, report files and the valid-fingerprint ledger.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use url::Url;

use crate::profile::{CandidateOrigin, ResourceProfile};
use crate::search::{build_query, QueryKind, SearchHit};
use crate::validate::ValidationRecord;

/// Default ledger location, relative to the working directory.
pub const DEFAULT_LEDGER: &str = "valid_fingerprints.jsonl";

/// Counts and lists of the references harvested from the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSummary {
    /// Number of `src` references.
    pub src_count: usize,
    /// Number of `href` references.
    pub href_count: usize,
    /// Normalized `src` references.
    pub srcs: Vec<String>,
    /// Normalized `href` references.
    pub hrefs: Vec<String>,
    /// Deduplicated path components.
    pub resource_paths: Vec<String>,
}

impl From<&ResourceProfile> for ResourceSummary {
    fn from(profile: &ResourceProfile) -> Self {
        Self {
            src_count: profile.srcs.len(),
            href_count: profile.hrefs.len(),
            srcs: profile.srcs.clone(),
            hrefs: profile.hrefs.clone(),
            resource_paths: profile.resource_paths.clone(),
        }
    }
}

/// Single-shot search of the favicon hash. Never cross-validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconCheck {
    /// Favicon hash searched for.
    pub hash: String,
    /// Ready to paste search query.
    pub query: String,
    /// Rows the oracle returned.
    pub hit_count: usize,
    /// True when the hit count sits inside the specificity window.
    pub distinctive: bool,
    /// Prefix of the hits, placeholders removed.
    pub sampled_hits: Vec<SearchHit>,
}

/// A fingerprint that survived cross-validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidFingerprint {
    /// Fingerprint value.
    pub fingerprint: String,
    /// Whether the oracle or the expander produced it.
    pub origin: CandidateOrigin,
    /// Ready to paste search query.
    pub query: String,
    /// Mean similarity of the sampled hit sites.
    pub average_similarity: f64,
    /// Hit count observed while ranking.
    pub hit_count: usize,
}

impl From<&ValidationRecord> for ValidFingerprint {
    fn from(record: &ValidationRecord) -> Self {
        Self {
            fingerprint: record.candidate.value.clone(),
            origin: record.candidate.origin,
            query: build_query(QueryKind::Body, &record.candidate.value),
            average_similarity: record.average_similarity,
            hit_count: record.hit_count,
        }
    }
}

/// Everything learned about one analyzed site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteReport {
    /// Analyzed site.
    pub url: String,
    /// Favicon hash, when one was found.
    pub favicon_hash: Option<String>,
    /// Harvested references.
    pub resources: ResourceSummary,
    /// Fingerprints returned by the classification oracle.
    pub fingerprints: Vec<String>,
    /// Oracle fingerprints plus derived filenames.
    pub expanded_candidates: Vec<String>,
    /// Favicon hash search, when performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_check: Option<IconCheck>,
    /// Every cross-validation record, rarest candidate first.
    pub validations: Vec<ValidationRecord>,
    /// Valid records only, rarest candidate first.
    pub valid_fingerprints: Vec<ValidFingerprint>,
}

impl SiteReport {
    /// Assembles the report; valid fingerprints keep the record order.
    pub fn assemble(
        profile: &ResourceProfile,
        fingerprints: Vec<String>,
        expanded_candidates: Vec<String>,
        icon_check: Option<IconCheck>,
        validations: Vec<ValidationRecord>,
    ) -> Self {
        let valid_fingerprints = validations
            .iter()
            .filter(|record| record.is_valid())
            .map(ValidFingerprint::from)
            .collect();
        Self {
            url: profile.site_url.clone(),
            favicon_hash: profile.favicon_hash.clone(),
            resources: ResourceSummary::from(profile),
            fingerprints,
            expanded_candidates,
            icon_check,
            validations,
            valid_fingerprints,
        }
    }
}

#[derive(Debug, Serialize)]
struct LedgerEntry<'a> {
    emitted_at_epoch_ms: u64,
    site_url: &'a str,
    fingerprint: &'a str,
    origin: CandidateOrigin,
    query: &'a str,
    average_similarity: f64,
    hit_count: usize,
}

/// `fingerprint_<host>.json`, with dots and colons replaced by underscores.
pub fn default_report_path(site_url: &str) -> PathBuf {
    let host = Url::parse(site_url)
        .ok()
        .and_then(|url| {
            let host = url.host_str()?.to_string();
            Some(match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host,
            })
        })
        .unwrap_or_else(|| "site".to_string());
    PathBuf::from(format!("fingerprint_{}.json", host.replace(&['.', ':'][..], "_")))
}

/// Writes `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    create_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()
}

/// Appends one JSONL line per valid fingerprint. Returns the lines written.
pub fn append_ledger(path: &Path, report: &SiteReport) -> io::Result<usize> {
    if report.valid_fingerprints.is_empty() {
        return Ok(0);
    }
    create_parent(path)?;
    let timestamp = epoch_ms();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for valid in &report.valid_fingerprints {
        let entry = LedgerEntry {
            emitted_at_epoch_ms: timestamp,
            site_url: &report.url,
            fingerprint: &valid.fingerprint,
            origin: valid.origin,
            query: &valid.query,
            average_similarity: valid.average_similarity,
            hit_count: valid.hit_count,
        };
        let line = serde_json::to_string(&entry)?;
        writeln!(file, "{line}")?;
    }
    Ok(report.valid_fingerprints.len())
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_millis() as u64)
        .unwrap_or(0)
}

/// Summary printed when only resources were extracted.
pub fn render_profile_summary(profile: &ResourceProfile) -> String {
    format!(
        "--- Resource Summary ---\nsite: {}\nfavicon hash: {}\nresources: {} src, {} href, {} distinct paths",
        profile.site_url,
        profile.favicon_hash.as_deref().unwrap_or("not found"),
        profile.srcs.len(),
        profile.hrefs.len(),
        profile.resource_paths.len()
    )
}

/// Human readable end-of-run summary.
pub fn render_summary(report: &SiteReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Fingerprint Summary ---");
    let _ = writeln!(out, "site: {}", report.url);
    let _ = writeln!(
        out,
        "favicon hash: {}",
        report.favicon_hash.as_deref().unwrap_or("not found")
    );
    let _ = writeln!(
        out,
        "resources: {} src, {} href",
        report.resources.src_count, report.resources.href_count
    );
    let _ = writeln!(
        out,
        "candidates: {} from oracle, {} after expansion",
        report.fingerprints.len(),
        report.expanded_candidates.len()
    );
    if let Some(icon) = &report.icon_check {
        let _ = writeln!(
            out,
            "icon check: {} -> {} hits{}",
            icon.query,
            icon.hit_count,
            if icon.distinctive { "" } else { " (not distinctive)" }
        );
    }
    let _ = writeln!(out, "validated candidates: {}", report.validations.len());
    if report.valid_fingerprints.is_empty() {
        let _ = write!(out, "valid fingerprints: none");
        return out;
    }
    let _ = writeln!(out, "valid fingerprints: {}", report.valid_fingerprints.len());
    for (idx, valid) in report.valid_fingerprints.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {}  similarity {:.2}  hits {}",
            idx + 1,
            valid.query,
            valid.average_similarity,
            valid.hit_count
        );
    }
    out.truncate(out.trim_end().len());
    out
}
