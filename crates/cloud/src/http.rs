//! HTTP client wrapper with Range request support and retry logic.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{CloudError, Result};

/// HTTP client for fetching byte ranges from remote files.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(request_timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, max_retries })
    }

    /// Total size of a remote file, from a HEAD request.
    pub async fn content_length(&self, url: &str) -> Result<u64> {
        let resp = self.execute_with_retry(|| self.client.head(url)).await?;
        if !resp.status().is_success() {
            return Err(CloudError::Network(format!("HTTP {} for HEAD {}", resp.status(), url)));
        }

        let accepts_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .map_or(true, |v| v.contains("bytes"));
        if !accepts_ranges {
            return Err(CloudError::RangeNotSupported { url: url.to_string() });
        }

        resp.headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| CloudError::Network(format!("no content-length for {}", url)))
    }

    /// Fetch `[offset .. offset + length)` from a remote file.
    pub async fn fetch_range(&self, url: &str, offset: u64, length: u64) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let range_value = format!("bytes={}-{}", offset, offset + length - 1);

        let resp = self
            .execute_with_retry(|| self.client.get(url).header("Range", range_value.as_str()))
            .await?;

        let status = resp.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE
            || (status.is_success() && status != StatusCode::PARTIAL_CONTENT)
        {
            return Err(CloudError::RangeNotSupported { url: url.to_string() });
        }
        if !status.is_success() {
            return Err(CloudError::Network(format!("HTTP {} fetching {}", status, url)));
        }

        let bytes = resp.bytes().await?;
        debug!(url, offset, length = bytes.len(), "fetched byte range");
        Ok(bytes.to_vec())
    }

    /// Send a request, retrying timeouts, connection failures and 5xx
    /// responses with exponential backoff (200ms, 400ms, 800ms, ...).
    async fn execute_with_retry<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let outcome = build().send().await;
            let retryable = match &outcome {
                Ok(resp) => resp.status().is_server_error(),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if !retryable || attempt >= self.max_retries {
                return Ok(outcome?);
            }

            attempt += 1;
            let delay = Duration::from_millis(200 * (1 << (attempt - 1)));
            warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying HTTP request");
            tokio::time::sleep(delay).await;
        }
    }
}
