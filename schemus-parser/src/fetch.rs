//! Schema fetching
//!
//! The acquisition driver only sees the [`SchemaFetcher`] trait; the
//! default implementation is an HTTP fetcher backed by reqwest. Tests swap
//! in an in-memory fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{ParseError, ParseResult};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Fetches schema bodies by URL
///
/// Implementations must treat non-success responses as errors; the
/// acquisition driver wraps failures with the `(namespace, url)` pair.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> ParseResult<Vec<u8>>;
}

/// HTTP schema fetcher
///
/// # Example
///
/// ```no_run
/// use schemus_parser::HttpFetcher;
/// use std::time::Duration;
///
/// let fetcher = HttpFetcher::builder()
///     .timeout(Duration::from_secs(10))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with default settings (30-second timeout)
    pub fn new() -> Self {
        Self {
            http_client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create a builder for advanced configuration
    pub fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::new()
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        HttpFetcher::new()
    }
}

#[async_trait]
impl SchemaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> ParseResult<Vec<u8>> {
        #[cfg(feature = "tracing")]
        debug!(url = %url, "Fetching schema");

        let response = match self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                #[cfg(feature = "tracing")]
                warn!(url = %url, error = %e, "Schema fetch failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            #[cfg(feature = "tracing")]
            warn!(url = %url, status = %status, "Schema fetch returned an error status");
            return Err(ParseError::Http(response.error_for_status().unwrap_err()));
        }

        let body = response.bytes().await?;

        #[cfg(feature = "tracing")]
        debug!(url = %url, size = body.len(), "Schema fetched");

        Ok(body.to_vec())
    }
}

/// Builder for configuring an HTTP schema fetcher
pub struct HttpFetcherBuilder {
    timeout: Duration,
    http_client: Option<Client>,
}

impl HttpFetcherBuilder {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            http_client: None,
        }
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom HTTP client
    ///
    /// This allows configuring the underlying reqwest client with proxies,
    /// authentication, or custom certificates.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> HttpFetcher {
        HttpFetcher {
            http_client: self.http_client.unwrap_or_default(),
            timeout: self.timeout,
        }
    }
}

impl Default for HttpFetcherBuilder {
    fn default() -> Self {
        HttpFetcherBuilder::new()
    }
}
