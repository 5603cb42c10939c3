//! Site profiling: root page harvest plus favicon hash.

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::error::FetchError;
use crate::favicon::resolve_favicon_hash;
use crate::html::stream_resources;
use crate::profile::ResourceProfile;

/// User agent sent to profiled sites.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
/// Default page fetch timeout.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP behavior used when visiting a site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchSettings {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Accept self-signed and expired certificates.
    pub accept_invalid_certs: bool,
    /// User agent header.
    pub user_agent: String,
    /// Redirects followed before giving up.
    pub max_redirects: usize,
    /// Whether to look up and hash the favicon.
    pub fetch_favicon: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PAGE_TIMEOUT,
            accept_invalid_certs: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
            fetch_favicon: true,
        }
    }
}

/// Produces a [`ResourceProfile`] for a site.
#[allow(async_fn_in_trait)]
pub trait Profiler {
    /// Visits `target_url` and harvests its resources.
    async fn profile(&self, target_url: &str) -> Result<ResourceProfile, FetchError>;
}

/// Profiler backed by live HTTP requests.
///
/// Each call builds its own client so no connection or cookie state carries
/// over between unrelated hosts.
#[derive(Clone, Debug, Default)]
pub struct SiteProfiler {
    settings: FetchSettings,
}

impl SiteProfiler {
    /// Creates a profiler with `settings`.
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn client(&self) -> Result<Client, FetchError> {
        Client::builder()
            .user_agent(self.settings.user_agent.as_str())
            .timeout(self.settings.timeout)
            .danger_accept_invalid_certs(self.settings.accept_invalid_certs)
            .redirect(Policy::limited(self.settings.max_redirects))
            .build()
            .map_err(FetchError::Client)
    }
}

impl Profiler for SiteProfiler {
    async fn profile(&self, target_url: &str) -> Result<ResourceProfile, FetchError> {
        let url = Url::parse(target_url).map_err(|err| FetchError::invalid_url(target_url, err))?;
        let client = self.client()?;

        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::http(target_url, err))?;
        let status = resp.status();
        if !status.is_success() {
            debug!(target = target_url, status = status.as_u16(), "harvesting non-success page");
        }
        let page_url = resp.url().clone();
        let resources = stream_resources(resp, page_url.clone())
            .await
            .map_err(|source| FetchError::Html {
                url: target_url.to_string(),
                source,
            })?;

        let favicon_hash = if self.settings.fetch_favicon {
            resolve_favicon_hash(&client, &page_url, resources.icon_href.as_deref()).await
        } else {
            None
        };

        let profile = ResourceProfile::new(target_url, favicon_hash, resources);
        info!(
            target = target_url,
            references = profile.reference_count(),
            paths = profile.resource_paths.len(),
            favicon = profile.favicon_hash.as_deref().unwrap_or("-"),
            "site profiled"
        );
        Ok(profile)
    }
}
