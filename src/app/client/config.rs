//! Upstream HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of the reqwest
//! client used for both the index fetch and the origin download fetch.

use std::time::Duration;

use reqwest::{Client, Proxy};
use url::Url;

use crate::constants::{http, limits};
use crate::errors::{FetchError, FetchResult};

/// Configuration for the upstream HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upstream simple index; `None` disables upstream listings
    pub index_url: Option<Url>,
    /// Outbound proxy with credentials already in its userinfo
    pub proxy: Option<Url>,
    /// User-Agent header for every outbound request
    pub user_agent: String,
    /// Read inactivity timeout; also the total deadline of an index fetch
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retries of the index fetch after the first attempt
    pub max_retries: u32,
    /// Base delay of the index fetch backoff
    pub retry_base_delay: Duration,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            index_url: Url::parse(http::DEFAULT_INDEX_URL).ok(),
            proxy: None,
            user_agent: http::USER_AGENT.to_string(),
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
            pool_idle_timeout: http::POOL_IDLE_TIMEOUT,
            pool_max_per_host: http::POOL_MAX_PER_HOST,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::ClientBuild` if the proxy URL is rejected or the
    /// TLS backend cannot be initialised
    pub fn build_http_client(&self) -> FetchResult<Client> {
        let mut client_builder = Client::builder()
            .read_timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.clone())
            .tcp_nodelay(true)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_per_host);

        match &self.proxy {
            // reqwest lifts userinfo into a Proxy-Authorization header
            Some(proxy_url) => {
                let proxy = Proxy::all(proxy_url.as_str())
                    .map_err(|e| FetchError::ClientBuild(e.to_string()))?;
                client_builder = client_builder.proxy(proxy);
            }
            None => {
                client_builder = client_builder.no_proxy();
            }
        }

        client_builder
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))
    }
}
