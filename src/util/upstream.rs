//! Plain byte fetches against third-party hosts, shared by the image proxy route and the
//! compositor's remote fallback.

use std::time::Duration;

use http::StatusCode;
use http::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::instrument;

use crate::constants::{MAX_FETCH_BYTES, PROXY_USER_AGENT, UPSTREAM_CONNECT_TIMEOUT_SECS};
use crate::util::is_http_url;

/// The client every outbound call goes through. A request that takes longer than `timeout`
/// end to end fails with a reqwest timeout error.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(UPSTREAM_CONNECT_TIMEOUT_SECS).min(timeout))
        .build()
}

#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: MAX_FETCH_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> FetchResult<FetchedImage> {
        if !is_http_url(url) {
            return Err(FetchErr::UnsupportedScheme(url.to_owned()));
        }

        let mut res = self
            .client
            .get(url)
            .header(http::header::USER_AGENT, PROXY_USER_AGENT)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            tracing::warn!(code = %status, "upstream image fetch returned non-success");
            return Err(FetchErr::Status(status));
        }

        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if let Some(len) = res.content_length()
            && len > self.max_bytes as u64
        {
            tracing::warn!(len, limit = self.max_bytes, "upstream image too large");
            return Err(FetchErr::TooLarge(self.max_bytes));
        }

        // content-length may be missing
        let mut bytes = Vec::new();
        while let Some(chunk) = res.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                tracing::warn!(limit = self.max_bytes, "upstream image body exceeded limit");
                return Err(FetchErr::TooLarge(self.max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }
        tracing::debug!(len = bytes.len(), content_type = ?content_type, "fetched upstream image");

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

pub type FetchResult<T> = core::result::Result<T, FetchErr>;

#[derive(Debug, Error)]
pub enum FetchErr {
    #[error("only http(s) urls can be fetched, got '{0}'")]
    UnsupportedScheme(String),

    #[error("Upstream error {}", .0.as_u16())]
    Status(StatusCode),

    #[error("Upstream image exceeds {0} bytes")]
    TooLarge(usize),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_passes_bytes_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/art.webp"))
            .and(header("user-agent", PROXY_USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/webp")
                    .set_body_bytes(vec![1u8, 2, 3]),
            )
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(reqwest::Client::new());
        let img = fetcher
            .fetch(&format!("{}/art.webp", server.uri()))
            .await
            .unwrap();

        assert_eq!(img.bytes, vec![1, 2, 3]);
        assert_eq!(img.content_type.as_deref(), Some("image/webp"));
    }

    #[tokio::test]
    async fn test_fetch_reports_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(reqwest::Client::new());
        let err = fetcher
            .fetch(&format!("{}/missing.png", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchErr::Status(s) if s == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_fetch_caps_body_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(reqwest::Client::new()).with_max_bytes(16);
        let err = fetcher
            .fetch(&format!("{}/big.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchErr::TooLarge(16)));

        let fetcher = ImageFetcher::new(reqwest::Client::new()).with_max_bytes(64);
        let img = fetcher
            .fetch(&format!("{}/big.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(img.bytes.len(), 64);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1u8])
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(http_client(Duration::from_millis(200)).unwrap());
        let err = fetcher
            .fetch(&format!("{}/slow.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchErr::ReqwestError(ref e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http() {
        let fetcher = ImageFetcher::new(reqwest::Client::new());
        let err = fetcher.fetch("file:///etc/hosts").await.unwrap_err();
        assert!(matches!(err, FetchErr::UnsupportedScheme(_)));
    }
}
