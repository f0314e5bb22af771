//! Core HTTP operations with retry logic
//!
//! The index fetch is retried with exponential backoff on transport errors
//! and 5xx answers. The origin download fetch is single-shot: its body is
//! streamed straight to the caller, so a retry could not be made invisible.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use crate::errors::{FetchError, FetchResult};

/// Outcome of fetching one index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexPage {
    /// Page body
    Found(String),
    /// Upstream does not know the project
    Missing,
}

/// HTTP operations handler with resilience patterns
#[derive(Debug, Clone)]
pub struct HttpHandler {
    client: Client,
    max_retries: u32,
    retry_base_delay: Duration,
    index_timeout: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and retry policy
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use for requests
    /// * `max_retries` - Retries after the first attempt of an index fetch
    /// * `retry_base_delay` - Backoff base; attempt `n` waits `base * 2^n`
    /// * `index_timeout` - Total deadline of one index page attempt
    pub fn new(
        client: Client,
        max_retries: u32,
        retry_base_delay: Duration,
        index_timeout: Duration,
    ) -> Self {
        Self {
            client,
            max_retries,
            retry_base_delay,
            index_timeout,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Fetches an index page with retry logic
    ///
    /// # Arguments
    ///
    /// * `url` - The page URL
    ///
    /// # Errors
    ///
    /// Returns `FetchError::MaxRetriesExceeded` once transport failures or
    /// 5xx answers exhaust the retry budget, and `FetchError::Status` for
    /// any other non-success status except 404
    pub async fn get_index_page(&self, url: &Url) -> FetchResult<IndexPage> {
        let mut retries = 0;
        loop {
            let request = self.client.get(url.as_str()).timeout(self.index_timeout);
            let failure = match request.send().await {
                Ok(response) => match response.status() {
                    StatusCode::OK => match response.text().await {
                        Ok(body) => {
                            tracing::debug!("Fetched index page {} ({} bytes)", url, body.len());
                            return Ok(IndexPage::Found(body));
                        }
                        Err(e) => format!("reading body failed: {e}"),
                    },
                    StatusCode::NOT_FOUND => {
                        tracing::debug!("Index page {} not found upstream", url);
                        return Ok(IndexPage::Missing);
                    }
                    status if status.is_server_error() => format!("server answered {status}"),
                    status => {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        })
                    }
                },
                Err(e) => e.to_string(),
            };

            if retries >= self.max_retries {
                tracing::error!(
                    "Index request to {} failed after {} retries: {}",
                    url,
                    self.max_retries,
                    failure
                );
                return Err(FetchError::MaxRetriesExceeded {
                    url: url.to_string(),
                    max_retries: self.max_retries,
                });
            }

            retries += 1;
            let delay = self.backoff_delay(retries);
            tracing::warn!(
                "Index request to {} failed (attempt {}/{}): {}. Retrying in {}ms",
                url,
                retries,
                self.max_retries,
                failure,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Starts a streamed GET and checks its status
    ///
    /// Only the client's connect and read timeouts apply, so a body that
    /// keeps arriving is never cut off.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Transport` if no response arrives and
    /// `FetchError::Status` for any status other than 200
    pub async fn get_stream(&self, url: &Url) -> FetchResult<reqwest::Response> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
