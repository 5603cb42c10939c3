//! Streaming resource harvesting using `lol_html`.

use crate::{is_icon_rel, Attribute, ResourceSet};
use html_escape::decode_html_entities;
use lol_html::html_content::Element;
use lol_html::{element, HtmlRewriter, OutputSink, Settings};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

/// Incremental harvester fed with response body chunks.
pub struct ResourceStream {
    rewriter: HtmlRewriter<'static, NoopSink>,
    state: Arc<Mutex<ResourceSet>>,
}

impl ResourceStream {
    /// Creates a harvester resolving references against `base`.
    pub fn new(base: Option<Url>) -> Self {
        let state = Arc::new(Mutex::new(ResourceSet::default()));
        let element_state = Arc::clone(&state);

        let handler = element!("*", move |el: &mut Element<'_, '_>| {
            let src = el.get_attribute("src");
            let href = el.get_attribute("href");
            if src.is_none() && href.is_none() {
                return Ok(());
            }
            let icon = el.tag_name().eq_ignore_ascii_case("link")
                && el.get_attribute("rel").as_deref().is_some_and(is_icon_rel);

            let mut set = element_state
                .lock()
                .map_err(|_| "resource collector mutex poisoned")?;
            if let Some(src) = src {
                set.push(Attribute::Src, &decode_html_entities(&src), base.as_ref());
            }
            if let Some(href) = href {
                let href = decode_html_entities(&href);
                set.push(Attribute::Href, &href, base.as_ref());
                if icon {
                    set.offer_icon(&href, base.as_ref());
                }
            }
            Ok(())
        });

        let rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![handler],
                ..Settings::default()
            },
            NoopSink,
        );

        Self { rewriter, state }
    }

    /// Streams a chunk of HTML into the harvester.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), StreamError> {
        self.rewriter.write(chunk).map_err(StreamError::Rewrite)
    }

    /// Finalizes the stream and returns the collected references.
    pub fn finish(self) -> Result<ResourceSet, StreamError> {
        let ResourceStream { rewriter, state } = self;
        rewriter.end().map_err(StreamError::Rewrite)?;

        let state = Arc::try_unwrap(state).map_err(|_| StreamError::CollectorInUse)?;
        state
            .into_inner()
            .map_err(|_| StreamError::CollectorPoisoned)
    }
}

/// Convenience helper for in-memory HTML.
pub fn extract_resources_streaming(
    html: &[u8],
    base: Option<Url>,
) -> Result<ResourceSet, StreamError> {
    let mut stream = ResourceStream::new(base);
    stream.write(html)?;
    stream.finish()
}

/// Errors surfaced while streaming HTML.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The HTML rewriter encountered malformed markup.
    #[error("html rewrite error: {0}")]
    Rewrite(#[source] lol_html::errors::RewritingError),
    /// Internal buffer still had outstanding references.
    #[error("resource collector still in use")]
    CollectorInUse,
    /// Collector mutex was poisoned while draining results.
    #[error("resource collector mutex poisoned")]
    CollectorPoisoned,
}

struct NoopSink;

impl OutputSink for NoopSink {
    fn handle_chunk(&mut self, _chunk: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::{extract_resources_streaming, ResourceStream};
    use crate::extract_resources;
    use pretty_assertions::assert_eq;
    use url::Url;

    const PAGE: &str = r#"
    <html>
      <head>
        <link rel="icon" type="image/png" href="/assets/fav.png?v=1">
        <link rel="stylesheet" href="/assets/portal.css">
        <script src="https://cdn.jsdelivr.net/npm/jquery.min.js"></script>
      </head>
      <body>
        <img src="data:image/gif;base64,R0lGODlhAQABAAAAACw=">
        <a href="/download?file=a&amp;b=c">Download</a>
        <script src="/assets/portal.js?build=77"></script>
      </body>
    </html>
    "#;

    #[test]
    fn streamed_chunks_match_dom_extraction() {
        let base = Url::parse("http://10.0.0.8:8080/").unwrap();

        let mut stream = ResourceStream::new(Some(base.clone()));
        for chunk in PAGE.as_bytes().chunks(16) {
            stream.write(chunk).unwrap();
        }
        let streamed = stream.finish().unwrap();

        assert_eq!(streamed, extract_resources(PAGE, Some(&base)));
        assert_eq!(
            streamed.icon_href.as_deref(),
            Some("http://10.0.0.8:8080/assets/fav.png?v=1")
        );
        assert_eq!(
            streamed.hrefs,
            vec![
                "http://10.0.0.8:8080/assets/fav.png".to_string(),
                "http://10.0.0.8:8080/assets/portal.css".to_string(),
                "http://10.0.0.8:8080/download".to_string(),
            ]
        );
    }

    #[test]
    fn empty_document_yields_empty_set() {
        let set = extract_resources_streaming(b"<html><body></body></html>", None).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.icon_href, None);
    }
}
