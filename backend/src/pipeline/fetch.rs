//! Second pipeline stage: downloads the manifest document.
//!
//! A fetch is bounded three ways: total time, number of redirects followed and
//! body size. The body is streamed so an oversized or endless response is cut
//! off as soon as it crosses the limit instead of being buffered whole.

use crate::config::FetchLimits;
use crate::pipeline::accept::CanonicalUrl;
use futures_util::StreamExt;
use log::debug;
use reqwest::{redirect, Client};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("funding-portal/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out fetching {0}")]
    Timeout(String),
    #[error("too many redirects fetching {0}")]
    TooManyRedirects(String),
    #[error("manifest at {url} is larger than {max_bytes} bytes")]
    PayloadTooLarge { url: String, max_bytes: u64 },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("error fetching {url}: {message}")]
    Request { url: String, message: String },
    #[error("could not build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    fn from_reqwest(url: &CanonicalUrl, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            FetchError::Timeout(url)
        } else if err.is_redirect() {
            FetchError::TooManyRedirects(url)
        } else {
            FetchError::Request {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// Shared HTTP client plus the limits every fetch runs under.
///
/// Cloning is cheap: `reqwest::Client` is reference counted internally.
#[derive(Clone)]
pub struct ManifestFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: u64,
}

impl ManifestFetcher {
    pub fn new(limits: &FetchLimits) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::limited(limits.max_redirects))
            .timeout(limits.timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            timeout: limits.timeout,
            max_bytes: limits.max_bytes,
        })
    }

    /// Fetches the raw manifest bytes at `url`.
    ///
    /// The whole operation, body included, is raced against the configured
    /// timeout; losing the race drops the in-flight request and its connection.
    pub async fn fetch(&self, url: &CanonicalUrl) -> Result<Vec<u8>, FetchError> {
        match tokio::time::timeout(self.timeout, self.fetch_body(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(url.to_string())),
        }
    }

    async fn fetch_body(&self, url: &CanonicalUrl) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(self.too_large(url));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::from_reqwest(url, e))?;
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn too_large(&self, url: &CanonicalUrl) -> FetchError {
        FetchError::PayloadTooLarge {
            url: url.to_string(),
            max_bytes: self.max_bytes,
        }
    }
}
