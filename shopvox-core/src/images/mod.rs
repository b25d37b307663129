//! Image liveness checks.
//!
//! Product image URLs in the catalogue go stale. Before a URL is shown it is
//! fetched and decoded; anything that fails is replaced by the shared
//! [`Placeholder`]. Substitutions are logged but never reported to the
//! caller as errors.

mod placeholder;

pub use placeholder::Placeholder;

use crate::config::ImageConfig;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server answered with status {0}")]
    Status(u16),

    #[error("Payload is not a decodable image: {0}")]
    Decode(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Payload exceeds {0} bytes")]
    TooLarge(usize),
}

pub type Result<T> = std::result::Result<T, ImageFetchError>;

/// Downloads image payloads.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Returns the response body of a successful (2xx) fetch.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches images over HTTP(S), refusing bodies over `max_bytes`.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            max_bytes: Self::DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageFetchError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes as u64)
        {
            return Err(ImageFetchError::TooLarge(self.max_bytes));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(ImageFetchError::TooLarge(self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Checks that `bytes` decode as a raster image.
pub fn verify_image(bytes: &[u8]) -> Result<()> {
    image::load_from_memory(bytes)
        .map(|_| ())
        .map_err(|e| ImageFetchError::Decode(e.to_string()))
}

/// The source to display for `url` given the outcome of its check.
pub fn resolve(url: &str, outcome: &Result<()>, placeholder: &Placeholder) -> String {
    match outcome {
        Ok(()) => url.to_string(),
        Err(_) => placeholder.data_uri().to_string(),
    }
}

/// Replaces dead image URLs with the placeholder.
///
/// Each URL gets its own timeout; checks for one result set run
/// concurrently, at most `max_concurrent` at a time, and one failure never
/// affects another.
#[derive(Clone)]
pub struct ImageGuard {
    fetcher: Arc<dyn ImageFetcher>,
    placeholder: Arc<Placeholder>,
    timeout: Duration,
    max_concurrent: usize,
    verify: bool,
}

impl ImageGuard {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, placeholder: Arc<Placeholder>, timeout: Duration) -> Self {
        Self {
            fetcher,
            placeholder,
            timeout,
            max_concurrent: 4,
            verify: true,
        }
    }

    pub fn from_config(config: &ImageConfig, placeholder: Arc<Placeholder>) -> Self {
        let fetcher = HttpImageFetcher::new().with_max_bytes(config.max_image_bytes);
        Self::new(Arc::new(fetcher), placeholder, config.fetch_timeout())
            .with_max_concurrent(config.max_concurrent_checks)
            .with_verify(config.verify)
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// With verification off every URL is passed through unchecked.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn placeholder(&self) -> &Placeholder {
        &self.placeholder
    }

    /// Returns `url` if it serves a decodable image, otherwise the
    /// placeholder.
    pub async fn check(&self, url: &str) -> String {
        let url = url.trim();
        if !self.verify && !url.is_empty() {
            return url.to_string();
        }

        let outcome = self.probe(url).await;
        match &outcome {
            Ok(()) => debug!(url, "Image is live"),
            Err(e) => warn!(url, error = %e, "Substituting placeholder for image"),
        }
        resolve(url, &outcome, &self.placeholder)
    }

    /// Checks every URL, preserving order.
    pub async fn check_all(&self, urls: &[String]) -> Vec<String> {
        stream::iter(urls.iter().map(|url| self.check(url)))
            .buffered(self.max_concurrent)
            .collect()
            .await
    }

    async fn probe(&self, url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ImageFetchError::Decode("empty URL".to_string()));
        }
        let bytes = tokio::time::timeout(self.timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| ImageFetchError::Timeout(self.timeout))??;
        verify_image(&bytes)
    }
}
