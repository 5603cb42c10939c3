//! Favicon lookup and FOFA/Shodan compatible hashing.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::error::FetchError;

/// Favicons larger than this are ignored.
pub const MAX_FAVICON_BYTES: usize = 1024 * 1024;

const FALLBACK_PATHS: [&str; 2] = ["/favicon.ico", "/favicon.png"];
const BASE64_LINE: usize = 76;

/// MurmurHash3 (x86, 32 bit, seed 0) of the MIME style base64 of `bytes`.
///
/// The encoding wraps every 76 characters and ends with a newline, which is
/// what search engines hash when indexing `icon_hash`.
pub fn favicon_hash(bytes: &[u8]) -> i32 {
    let encoded = STANDARD.encode(bytes);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE + 1);
    for (idx, ch) in encoded.chars().enumerate() {
        wrapped.push(ch);
        if (idx + 1) % BASE64_LINE == 0 {
            wrapped.push('\n');
        }
    }
    if !wrapped.ends_with('\n') {
        wrapped.push('\n');
    }
    murmurhash3::murmurhash3_x86_32(wrapped.as_bytes(), 0) as i32
}

/// URLs tried for the favicon: the page's icon link, then the usual paths.
pub fn favicon_candidates(base: &Url, icon_href: Option<&str>) -> Vec<Url> {
    let mut urls: Vec<Url> = Vec::with_capacity(FALLBACK_PATHS.len() + 1);
    let declared = icon_href.and_then(|href| base.join(href).ok());
    let fallbacks = FALLBACK_PATHS.iter().filter_map(|path| base.join(path).ok());
    for url in declared.into_iter().chain(fallbacks) {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Hash of the first favicon candidate that answers `200` with a body.
///
/// Every failure is logged and skipped; `None` means no favicon was found.
pub async fn resolve_favicon_hash(
    client: &Client,
    base: &Url,
    icon_href: Option<&str>,
) -> Option<String> {
    for url in favicon_candidates(base, icon_href) {
        match fetch_icon(client, &url).await {
            Ok(Some(bytes)) => {
                let hash = favicon_hash(&bytes).to_string();
                info!(url = %url, hash = %hash, "favicon hashed");
                return Some(hash);
            }
            Ok(None) => {}
            Err(err) => debug!(url = %url, error = %err, "favicon fetch failed"),
        }
    }
    None
}

async fn fetch_icon(client: &Client, url: &Url) -> Result<Option<Vec<u8>>, FetchError> {
    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| FetchError::http(url.as_str(), err))?;
    if resp.status() != StatusCode::OK {
        debug!(url = %url, status = resp.status().as_u16(), "favicon not served");
        return Ok(None);
    }

    let mut stream = resp.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| FetchError::http(url.as_str(), err))?;
        if buf.len() + chunk.len() > MAX_FAVICON_BYTES {
            debug!(url = %url, limit = MAX_FAVICON_BYTES, "favicon too large");
            return Ok(None);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((!buf.is_empty()).then_some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(favicon_hash(b"\x00\x00\x01\x00"), -216455174);
        // 100 bytes encode past one 76 character line.
        let bytes: Vec<u8> = (0u8..100).collect();
        assert_eq!(favicon_hash(&bytes), -1165240594);
    }

    #[test]
    fn declared_icon_comes_first_without_duplicates() {
        let base = Url::parse("https://portal.example.org/app/index.html").unwrap();
        let urls: Vec<String> = favicon_candidates(&base, Some("/favicon.ico"))
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://portal.example.org/favicon.ico".to_string(),
                "https://portal.example.org/favicon.png".to_string(),
            ]
        );

        let urls: Vec<String> = favicon_candidates(&base, Some("img/logo.png?v=3"))
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(urls[0], "https://portal.example.org/app/img/logo.png?v=3");
        assert_eq!(urls.len(), 3);
    }

    #[test]
    fn fallbacks_only_without_icon_link() {
        let base = Url::parse("http://192.0.2.8:8080/").unwrap();
        assert_eq!(favicon_candidates(&base, None).len(), 2);
    }
}
