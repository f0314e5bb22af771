//! Upstream HTTP client for the simple index and origin downloads
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Core HTTP operations with retry logic

use url::Url;

use crate::app::index::UpstreamListing;
use crate::errors::{FetchError, FetchResult};

pub mod config;
pub mod http;

pub use config::ClientConfig;
pub use http::{HttpHandler, IndexPage};

/// HTTP client for the upstream index and artifact origins
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http_handler: HttpHandler,
    index_url: Option<Url>,
}

impl UpstreamClient {
    /// Creates a new client from configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::ClientBuild` if the underlying client cannot be built
    pub fn new(config: &ClientConfig) -> FetchResult<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(
            client,
            config.max_retries,
            config.retry_base_delay,
            config.request_timeout,
        );
        let index_url = config.index_url.clone().map(with_trailing_slash);

        match &config.proxy {
            Some(proxy) => tracing::info!("Using outbound proxy {}", redact(proxy)),
            None => tracing::debug!("No outbound proxy configured"),
        }
        match &index_url {
            Some(url) => tracing::info!("Upstream index: {}", url),
            None => tracing::info!("Upstream index disabled, serving local listings only"),
        }

        Ok(Self {
            http_handler,
            index_url,
        })
    }

    /// Configured upstream index base
    pub fn index_url(&self) -> Option<&Url> {
        self.index_url.as_ref()
    }

    /// URL of a project's upstream listing page
    pub fn project_index_url(&self, project: &str) -> Option<FetchResult<Url>> {
        self.index_url.as_ref().map(|base| {
            base.join(&format!("{project}/"))
                .map_err(|e| FetchError::InvalidUrl {
                    url: format!("{base}{project}/"),
                    error: e.to_string(),
                })
        })
    }

    /// Fetch a project's upstream listing
    ///
    /// Exhausted retries degrade to `UpstreamListing::Unavailable` so the
    /// caller can still answer from local storage.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Status` when upstream answers with a status that
    /// should be passed through (anything but 200, 404 and 5xx)
    pub async fn fetch_index(&self, project: &str) -> FetchResult<UpstreamListing> {
        let url = match self.project_index_url(project) {
            None => return Ok(UpstreamListing::NotConfigured),
            Some(url) => url?,
        };

        match self.http_handler.get_index_page(&url).await {
            Ok(IndexPage::Found(html)) => Ok(UpstreamListing::Entries { html, base: url }),
            Ok(IndexPage::Missing) => Ok(UpstreamListing::NotFound),
            Err(FetchError::MaxRetriesExceeded { .. }) => {
                tracing::warn!(
                    project = %project,
                    "Upstream index unreachable, serving local listing only"
                );
                Ok(UpstreamListing::Unavailable)
            }
            Err(e) => Err(e),
        }
    }

    /// Start a streamed origin download
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Transport` on connection failure and
    /// `FetchError::Status` when the origin does not answer 200
    pub async fn fetch_artifact(&self, url: &Url) -> FetchResult<reqwest::Response> {
        tracing::debug!("Fetching origin artifact {}", url);
        self.http_handler.get_stream(url).await
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Render a URL for logging with any password masked
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.password().is_some() {
        // set_password only fails for cannot-be-a-base URLs, which carry no credentials
        let _ = shown.set_password(Some("***"));
    }
    shown.to_string()
}
