//! Streaming HTML helpers built on `lol_html`.

use futures_util::StreamExt;
use reqwest::Response;
use resource_harvest::{ResourceSet, ResourceStream};
use tracing::debug;
use url::Url;

use crate::error::HtmlStreamError;

/// Bytes of a page body fed to the harvester before the rest is ignored.
pub const MAX_PAGE_BYTES: usize = 4 * 1024 * 1024;

/// Streams an HTTP response body through the resource harvester.
///
/// References resolve against `base`. Bodies longer than [`MAX_PAGE_BYTES`]
/// are truncated.
pub async fn stream_resources(
    response: Response,
    base: Url,
) -> Result<ResourceSet, HtmlStreamError> {
    let mut harvester = ResourceStream::new(Some(base));
    let mut consumed = 0usize;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(HtmlStreamError::Http)?;
        let remaining = MAX_PAGE_BYTES - consumed;
        let take = chunk.len().min(remaining);
        harvester.write(&chunk[..take])?;
        consumed += take;
        if consumed >= MAX_PAGE_BYTES {
            debug!(limit = MAX_PAGE_BYTES, "page body truncated");
            break;
        }
    }

    Ok(harvester.finish()?)
}
