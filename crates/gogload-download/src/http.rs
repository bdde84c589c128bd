//! HTTP backend abstraction for range downloads.
//!
//! This module provides a trait-based HTTP backend so the segment workers can
//! be tested against an in-memory server. The production implementation uses
//! reqwest with rustls.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, RANGE};

use gogload_core::{DownloadError, EngineConfig};

/// Response body as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>> + Send>>;

/// Response to a range request. Status checking is left to the caller.
pub struct RangeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: ByteStream,
}

// ============================================================================
// HTTP Backend Trait
// ============================================================================

/// Transport used by the engine for size probes and range requests.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Total size of the resource in bytes.
    async fn content_length(&self, url: &str) -> Result<u64, DownloadError>;

    /// Request bytes `start..=end`.
    async fn get_range(&self, url: &str, start: u64, end: u64)
    -> Result<RangeResponse, DownloadError>;
}

// ============================================================================
// Reqwest Backend
// ============================================================================

/// Production HTTP backend using reqwest.
///
/// Size probes carry a whole-request timeout. Range bodies stream for as long
/// as data keeps arriving, so the segment downloader bounds the wait for
/// headers and for each chunk instead.
pub struct ReqwestBackend {
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl ReqwestBackend {
    /// Create a backend from the engine configuration.
    pub fn new(config: &EngineConfig) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("gogload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DownloadError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            probe_timeout: config.connect_timeout + config.read_timeout,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        DownloadError::timeout(e.to_string())
    } else if let Some(status) = e.status() {
        DownloadError::http_status(status.as_u16(), e.to_string())
    } else {
        DownloadError::network(e.to_string())
    }
}

fn header_u64(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Extract the complete length from a `Content-Range` value (`bytes 0-0/1234`).
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn content_length(&self, url: &str) -> Result<u64, DownloadError> {
        match self.client.head(url).timeout(self.probe_timeout).send().await {
            Ok(response) if response.status().is_success() => {
                if let Some(len) = header_u64(response.headers(), CONTENT_LENGTH) {
                    if len > 0 {
                        return Ok(len);
                    }
                }
            }
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), "HEAD rejected, probing with a range request");
            }
            Err(e) => tracing::debug!(error = %e, "HEAD failed, probing with a range request"),
        }

        // Some CDNs refuse HEAD on signed links; a one-byte range reveals the size
        let response = self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::PARTIAL_CONTENT {
            if let Some(total) = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total)
            {
                return Ok(total);
            }
        } else if status.is_success() {
            if let Some(len) = header_u64(response.headers(), CONTENT_LENGTH) {
                return Ok(len);
            }
        } else {
            return Err(DownloadError::http_status(
                status.as_u16(),
                format!("size probe rejected with {status}"),
            ));
        }

        Err(DownloadError::size_unknown(
            "server reported neither Content-Length nor Content-Range",
        ))
    }

    async fn get_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
    ) -> Result<RangeResponse, DownloadError> {
        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error));

        Ok(RangeResponse {
            status,
            body: Box::pin(body),
        })
    }
}

// ============================================================================
// Fake Backend for Testing
// ============================================================================


#[cfg(test)]
mod tests {
    use super::testing::FakeBackend;
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-0/1234"), Some(1234));
        assert_eq!(parse_content_range_total(" bytes 0-0/99 "), Some(99));
        assert_eq!(parse_content_range_total("bytes 0-0/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[tokio::test]
    async fn test_fake_backend_serves_ranges() {
        let backend = FakeBackend::new().with_chunking(4, std::time::Duration::ZERO);
        backend.add_file("u", b"0123456789".to_vec());

        assert_eq!(backend.content_length("u").await.unwrap(), 10);

        let response = backend.get_range("u", 3, 8).await.unwrap();
        assert_eq!(response.status, 206);
        let chunks: Vec<Bytes> = response
            .body
            .map(|c| c.unwrap())
            .collect()
            .await;
        let joined: Vec<u8> = chunks.concat();
        assert_eq!(joined, b"345678");
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fake_backend_limited_faults() {
        let backend = FakeBackend::new();
        backend.add_file("u", vec![0; 100]);
        backend.fail_with_status("u", 503, Some(1));

        assert_eq!(backend.get_range("u", 0, 99).await.unwrap().status, 503);
        assert_eq!(backend.get_range("u", 0, 99).await.unwrap().status, 206);
    }
}
