//! Size-bounded HTTP download of remote assets.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use tracing::debug;

use super::http::build_client;
use crate::domain::errors::FetchError;
use crate::domain::ports::AssetFetcher;

/// Media downloads may be large, so they get a longer timeout than API calls.
const FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Downloads assets over HTTP, aborting once the size limit is exceeded.
pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    /// Creates a fetcher with its own client.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new() -> Result<Self, FetchError> {
        let client = build_client(FETCH_TIMEOUT)
            .map_err(|e| FetchError::network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Creates a fetcher sharing an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<Bytes, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let declared = response.content_length();
        if let Some(size) = declared
            && size > max_bytes
        {
            return Err(FetchError::TooLarge {
                size,
                limit: max_bytes,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let mut body = BytesMut::with_capacity(declared.unwrap_or(0).min(max_bytes) as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?
        {
            let size = (body.len() + chunk.len()) as u64;
            if size > max_bytes {
                return Err(FetchError::TooLarge {
                    size,
                    limit: max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(FetchError::Empty);
        }

        debug!(url = %url, size = body.len(), "Fetched asset");
        Ok(body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_fetch_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/video.mp4")
            .with_status(200)
            .with_body("0123456789")
            .create_async()
            .await;

        let fetcher = HttpAssetFetcher::new().unwrap();
        let body = fetcher
            .fetch(&format!("{}/video.mp4", server.url()), 100)
            .await
            .unwrap();

        assert_eq!(body.as_ref(), b"0123456789");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_declared_length_over_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/big")
            .with_status(200)
            .with_body(vec![0u8; 64])
            .create_async()
            .await;

        let fetcher = HttpAssetFetcher::new().unwrap();
        let result = fetcher.fetch(&format!("{}/big", server.url()), 16).await;

        assert!(matches!(
            result,
            Err(FetchError::TooLarge { size: 64, limit: 16 })
        ));
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/stream")
            .with_status(200)
            .with_chunked_body(|w| w.write_all(&[7u8; 64]))
            .create_async()
            .await;

        let fetcher = HttpAssetFetcher::new().unwrap();
        let result = fetcher.fetch(&format!("{}/stream", server.url()), 16).await;

        assert!(matches!(result, Err(FetchError::TooLarge { limit: 16, .. })));
    }

    #[tokio::test]
    async fn test_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpAssetFetcher::new().unwrap();
        let result = fetcher.fetch(&format!("{}/gone", server.url()), 16).await;

        assert!(matches!(result, Err(FetchError::Status { status: 404 })));
    }

    #[tokio::test]
    async fn test_empty_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/empty")
            .with_status(200)
            .create_async()
            .await;

        let fetcher = HttpAssetFetcher::new().unwrap();
        let result = fetcher.fetch(&format!("{}/empty", server.url()), 16).await;

        assert!(matches!(result, Err(FetchError::Empty)));
    }
}
