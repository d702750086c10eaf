use crate::util::{validate_feed_url, HostPolicy, UrlValidationError};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_FEED_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while opening or reading a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL failed validation before any request was made
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request or body read exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Opens feed URLs over HTTP.
///
/// One attempt per URL: there is no retry or backoff.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
    host_policy: HostPolicy,
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            max_bytes: DEFAULT_MAX_FEED_BYTES,
            host_policy: HostPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_host_policy(mut self, policy: HostPolicy) -> Self {
        self.host_policy = policy;
        self
    }

    /// Sends the request and returns the response positioned at the start of its body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - Bad URL, unsupported scheme, or disallowed host
    /// - [`FetchError::Network`] - Connection or TLS errors
    /// - [`FetchError::Timeout`] - No response within the timeout
    /// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
    pub async fn open(&self, url: &str) -> Result<OpenedStream, FetchError> {
        let url = validate_feed_url(url, self.host_policy)?;

        let response = tokio::time::timeout(self.timeout, self.client.get(url.clone()).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        tracing::debug!(
            url = %url,
            final_url = %response.url(),
            status = %response.status(),
            "Opened feed"
        );

        Ok(OpenedStream {
            response,
            timeout: self.timeout,
            max_bytes: self.max_bytes,
        })
    }
}

/// An open HTTP response whose body has not been read yet.
///
/// The connection is released when this value is dropped or consumed.
#[derive(Debug)]
pub struct OpenedStream {
    response: reqwest::Response,
    timeout: Duration,
    max_bytes: usize,
}

impl OpenedStream {
    /// Final URL of the response, after redirects.
    pub fn url(&self) -> &str {
        self.response.url().as_str()
    }

    /// Reads the whole body, enforcing the size limit and timeout.
    pub async fn read_to_end(self) -> Result<Vec<u8>, FetchError> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, read_limited_bytes(self.response, self.max_bytes))
            .await
            .map_err(|_| FetchError::Timeout)?
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_source() -> HttpSource {
        HttpSource::new(reqwest::Client::new()).with_host_policy(HostPolicy::AllowPrivate)
    }

    #[tokio::test]
    async fn test_open_and_read_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let stream = local_source().open(&url).await.unwrap();
        assert_eq!(stream.url(), url);
        assert_eq!(stream.read_to_end().await.unwrap(), b"<rss/>");
    }

    #[tokio::test]
    async fn test_open_404_single_attempt() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = local_source()
            .open(&format!("{}/feed", mock_server.uri()))
            .await;
        match result {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = local_source()
            .open(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::HttpStatus(503))));
    }

    #[tokio::test]
    async fn test_body_over_limit_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&mock_server)
            .await;

        let stream = local_source()
            .with_max_bytes(16)
            .open(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert!(matches!(
            stream.read_to_end().await,
            Err(FetchError::ResponseTooLarge)
        ));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<rss/>")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let result = local_source()
            .with_timeout(Duration::from_millis(50))
            .open(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_private_host_rejected_by_default() {
        let mock_server = MockServer::start().await;
        let source = HttpSource::new(reqwest::Client::new());

        let result = source.open(&format!("{}/feed", mock_server.uri())).await;
        assert!(matches!(
            result,
            Err(FetchError::InvalidUrl(UrlValidationError::Localhost))
        ));
    }

    #[tokio::test]
    async fn test_malformed_url_rejected_without_request() {
        let result = local_source().open("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
