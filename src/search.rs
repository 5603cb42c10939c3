//! Search oracle gateway.
//!
//! Fingerprints become FOFA style predicates (`body="..."`,
//! `icon_hash="..."`), each query is a single request capped at the oracle's
//! page size, and the length of the returned row list is the hit count.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

/// Default FOFA search endpoint.
pub const DEFAULT_FOFA_API: &str = "https://fofa.info/api/v1/search/all";
/// Largest page FOFA serves in one request.
pub const DEFAULT_PAGE_SIZE: usize = 10_000;
/// Timeout applied to every search request.
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

const RESULT_FIELDS: &str = "host,ip,port,protocol";
const HOST_FIELD: usize = 0;
const SCHEME_FIELD: usize = 3;

/// Predicate a query is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// The response body contains the fingerprint.
    Body,
    /// The favicon hash equals the fingerprint.
    IconHash,
}

impl QueryKind {
    fn field(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::IconHash => "icon_hash",
        }
    }
}

/// Builds a query string in the oracle grammar.
///
/// ```
/// use findsim::search::{build_query, QueryKind};
///
/// assert_eq!(build_query(QueryKind::Body, "/js/app.js"), r#"body="/js/app.js""#);
/// assert_eq!(build_query(QueryKind::IconHash, "-1373285829"), r#"icon_hash="-1373285829""#);
/// ```
pub fn build_query(kind: QueryKind, value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("{}=\"{}\"", kind.field(), escaped)
}

/// One row returned by the search oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    /// Host field, either `host[:port]` or a full URL.
    pub host: String,
    /// Scheme reported for the host (`http`, `https`).
    pub scheme: String,
}

impl SearchRow {
    /// Row from a host and scheme.
    pub fn new(host: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            scheme: scheme.into(),
        }
    }
}

/// A host that matched a query, as a fetchable root URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Root URL of the matching host.
    pub target_url: String,
    #[serde(skip)]
    placeholder: bool,
}

impl SearchHit {
    /// Hit pointing at `target_url`.
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            placeholder: false,
        }
    }

    /// Normalizes an oracle row, synthesizing `scheme://host` for bare hosts.
    pub fn from_row(row: SearchRow) -> Self {
        let host = row.host.trim();
        let placeholder = host.starts_with('0');
        let target_url = if has_web_scheme(host) {
            host.to_string()
        } else {
            let scheme = match row.scheme.trim() {
                "" => "http",
                scheme => scheme,
            };
            format!("{scheme}://{host}")
        };
        Self {
            target_url,
            placeholder,
        }
    }

    /// True for `0.0.0.0` style rows that never point at a real host.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

fn has_web_scheme(host: &str) -> bool {
    ["http://", "https://"].iter().any(|prefix| {
        host.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// External search index answering one query string at a time.
#[allow(async_fn_in_trait)]
pub trait SearchOracle {
    /// Issues `query` and returns every row of the single result page.
    async fn search(&self, query: &str) -> Result<Vec<SearchRow>, FetchError>;
}

/// FOFA HTTP API client.
pub struct FofaClient {
    endpoint: Url,
    key: String,
    page_size: usize,
    client: reqwest::Client,
}

impl FofaClient {
    /// Constructs a client for `endpoint` authenticated with `key`.
    pub fn new(
        endpoint: &str,
        key: impl Into<String>,
        page_size: usize,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint).map_err(|err| FetchError::invalid_url(endpoint, err))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            endpoint,
            key: key.into(),
            page_size,
            client,
        })
    }

    /// Full request URL for `query`, key included.
    pub fn request_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", self.key.trim())
            .append_pair("qbase64", &STANDARD.encode(query.as_bytes()))
            .append_pair("size", &self.page_size.to_string())
            .append_pair("fields", RESULT_FIELDS);
        url
    }

    /// Decodes a FOFA response body into rows.
    pub fn parse_response(&self, body: &[u8]) -> Result<Vec<SearchRow>, FetchError> {
        parse_fofa_body(self.endpoint.as_str(), body)
    }
}

impl SearchOracle for FofaClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchRow>, FetchError> {
        let endpoint = self.endpoint.as_str();
        debug!(query, "querying search api");
        let resp = self
            .client
            .get(self.request_url(query))
            .send()
            .await
            .map_err(|err| FetchError::http(endpoint, err.without_url()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp
            .bytes()
            .await
            .map_err(|err| FetchError::http(endpoint, err.without_url()))?;
        self.parse_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct FofaResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default)]
    results: Option<Vec<Value>>,
}

fn parse_fofa_body(endpoint: &str, body: &[u8]) -> Result<Vec<SearchRow>, FetchError> {
    let parsed: FofaResponse =
        serde_json::from_slice(body).map_err(|err| FetchError::Malformed {
            url: endpoint.to_string(),
            reason: err.to_string(),
        })?;
    if parsed.error {
        return Err(FetchError::Oracle(
            parsed.errmsg.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    let rows = parsed.results.unwrap_or_default();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let row = match row {
            Value::String(host) => SearchRow::new(host, ""),
            Value::Array(fields) => SearchRow::new(
                string_field(&fields, HOST_FIELD),
                string_field(&fields, SCHEME_FIELD),
            ),
            other => {
                return Err(FetchError::Malformed {
                    url: endpoint.to_string(),
                    reason: format!("unexpected result row {other}"),
                })
            }
        };
        out.push(row);
    }
    Ok(out)
}

fn string_field(fields: &[Value], idx: usize) -> String {
    fields
        .get(idx)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Turns fingerprints into queries and oracle rows into hits.
///
/// Transport failures are logged and reported as an empty hit list, which the
/// ranker treats as zero hits. Nothing is retried.
pub struct SearchGateway<O> {
    oracle: O,
}

impl<O: SearchOracle> SearchGateway<O> {
    /// Wraps `oracle`.
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Hits for a resource path fingerprint.
    pub async fn query(&self, fingerprint: &str) -> Vec<SearchHit> {
        self.run(build_query(QueryKind::Body, fingerprint)).await
    }

    /// Hits for a favicon hash.
    pub async fn query_icon(&self, hash: &str) -> Vec<SearchHit> {
        self.run(build_query(QueryKind::IconHash, hash)).await
    }

    /// Underlying oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    async fn run(&self, query: String) -> Vec<SearchHit> {
        match self.oracle.search(&query).await {
            Ok(rows) => {
                debug!(query = %query, rows = rows.len(), "search answered");
                rows.into_iter().map(SearchHit::from_row).collect()
            }
            Err(err) => {
                warn!(query = %query, error = %err, "search failed; treating as zero hits");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    struct RecordingOracle {
        queries: RefCell<Vec<String>>,
        fail: bool,
    }

    impl SearchOracle for RecordingOracle {
        async fn search(&self, query: &str) -> Result<Vec<SearchRow>, FetchError> {
            self.queries.borrow_mut().push(query.to_string());
            if self.fail {
                return Err(FetchError::Oracle("[820001] no permission".to_string()));
            }
            Ok(vec![
                SearchRow::new("203.0.113.5:8443", "https"),
                SearchRow::new("http://203.0.113.9", ""),
            ])
        }
    }

    fn client() -> FofaClient {
        FofaClient::new(
            "https://fofa.example/api/v1/search/all",
            "secret",
            10_000,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn query_values_are_escaped() {
        assert_eq!(
            build_query(QueryKind::Body, r#"a"b\c"#),
            r#"body="a\"b\\c""#
        );
    }

    #[test]
    fn rows_become_root_urls() {
        assert_eq!(
            SearchHit::from_row(SearchRow::new("198.51.100.4:8080", "http")).target_url,
            "http://198.51.100.4:8080"
        );
        assert_eq!(
            SearchHit::from_row(SearchRow::new("https://portal.example.org", "https")).target_url,
            "https://portal.example.org"
        );
        assert_eq!(
            SearchHit::from_row(SearchRow::new("portal.example.org", "")).target_url,
            "http://portal.example.org"
        );
        assert_eq!(
            SearchHit::from_row(SearchRow::new("httpd.example.com:8443", "https")).target_url,
            "https://httpd.example.com:8443"
        );
        assert_eq!(
            SearchHit::from_row(SearchRow::new("HTTPS://Portal.example.org", "")).target_url,
            "HTTPS://Portal.example.org"
        );
        assert!(SearchHit::from_row(SearchRow::new("0.0.0.0:80", "http")).is_placeholder());
        assert!(!SearchHit::from_row(SearchRow::new("10.0.0.1", "http")).is_placeholder());
    }

    #[test]
    fn request_url_carries_encoded_query() {
        let url = client().request_url(r#"body="/js/app.js""#);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("key".to_string(), "secret".to_string()),
                ("qbase64".to_string(), "Ym9keT0iL2pzL2FwcC5qcyI=".to_string()),
                ("size".to_string(), "10000".to_string()),
                ("fields".to_string(), "host,ip,port,protocol".to_string()),
            ]
        );
    }

    #[test]
    fn parses_rows_and_api_errors() {
        let body = br#"{"error":false,"size":2,"results":[["203.0.113.5:8443","203.0.113.5","8443","https"],["http://203.0.113.9","203.0.113.9","80","http"]]}"#;
        assert_eq!(
            client().parse_response(body).unwrap(),
            vec![
                SearchRow::new("203.0.113.5:8443", "https"),
                SearchRow::new("http://203.0.113.9", "http"),
            ]
        );

        let empty = br#"{"error":false,"size":0,"results":[]}"#;
        assert!(client().parse_response(empty).unwrap().is_empty());

        let rejected = br#"{"error":true,"errmsg":"[-700] Account Invalid"}"#;
        assert!(matches!(
            client().parse_response(rejected),
            Err(FetchError::Oracle(msg)) if msg.contains("Account Invalid")
        ));

        assert!(matches!(
            client().parse_response(b"<html>502</html>"),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn gateway_builds_predicates_and_normalizes_rows() {
        let gateway = SearchGateway::new(RecordingOracle {
            queries: RefCell::new(Vec::new()),
            fail: false,
        });
        let hits = gateway.query("/js/app.js").await;
        let icon_hits = gateway.query_icon("-247388890").await;

        assert_eq!(
            hits,
            vec![
                SearchHit::new("https://203.0.113.5:8443"),
                SearchHit::new("http://203.0.113.9"),
            ]
        );
        assert_eq!(icon_hits.len(), 2);
        assert_eq!(
            gateway.oracle().queries.borrow().clone(),
            vec![
                r#"body="/js/app.js""#.to_string(),
                r#"icon_hash="-247388890""#.to_string(),
            ]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn gateway_failures_yield_no_hits() {
        let gateway = SearchGateway::new(RecordingOracle {
            queries: RefCell::new(Vec::new()),
            fail: true,
        });
        assert!(gateway.query("/js/app.js").await.is_empty());
    }
}
