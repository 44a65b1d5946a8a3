//! HTTP client with built-in retry and proxy-aware timeouts.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};

use super::retry::{check_transient, with_retry};
use crate::config::{TransportConfig, build_http_client};

/// Per-request options.
///
/// Proxying and TLS verification are properties of the client (see
/// [`TransportConfig`]); this carries what can vary per call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        // A stalled body read is as transient as a stalled send.
        let body = response.bytes().await.map_err(check_transient)?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }
}

/// An HTTP-capable client.
///
/// The seam other components compose over when they need HTTP without
/// caring how it is dispatched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpDispatch: Send + Sync {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse>;
    async fn post(&self, url: &str, body: Bytes, options: &RequestOptions) -> Result<HttpResponse>;
}

/// HTTP client that retries transient network failures.
///
/// GET and POST run under the fixed retry policy of [`with_retry`]. When a
/// proxy is configured, caller-supplied timeouts are scaled by
/// [`crate::config::PROXY_TIMEOUT_FACTOR`] before dispatch. Responses come
/// back whatever their status; HTTP-level error codes are never retried and
/// never turned into errors here.
pub struct RetryingClient {
    client: Client,
    config: TransportConfig,
}

impl RetryingClient {
    /// Builds the underlying client from `config` (TLS verification, proxy).
    pub fn new(config: TransportConfig) -> Result<Self> {
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    /// Wraps an already-built client. `proxy` must be the proxy the client
    /// was built with; it drives timeout scaling and the proxy debug line.
    pub fn from_parts(client: Client, proxy: Option<String>) -> Self {
        let config = TransportConfig {
            proxy,
            ..TransportConfig::default()
        };
        Self { client, config }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn log_proxy(&self, url: &str) {
        if let Some(proxy) = &self.config.proxy {
            debug!("Using proxy {} for: {}", proxy, url);
        }
    }

    #[tracing::instrument(skip(self, options))]
    pub async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse> {
        self.log_proxy(url);
        let timeout = self.config.effective_timeout(options.timeout);

        with_retry("GET", || async {
            let mut request = self.client.get(url).headers(options.headers.clone());
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }
            let response = request.send().await.map_err(check_transient)?;
            HttpResponse::read(response).await
        })
        .await
    }

    #[tracing::instrument(skip(self, body, options))]
    pub async fn post(
        &self,
        url: &str,
        body: Bytes,
        options: &RequestOptions,
    ) -> Result<HttpResponse> {
        self.log_proxy(url);
        let timeout = self.config.effective_timeout(options.timeout);

        with_retry("POST", || {
            let body = body.clone();
            async move {
                let mut request = self
                    .client
                    .post(url)
                    .headers(options.headers.clone())
                    .body(body);
                if let Some(timeout) = timeout {
                    request = request.timeout(timeout);
                }
                let response = request.send().await.map_err(check_transient)?;
                HttpResponse::read(response).await
            }
        })
        .await
    }
}

#[async_trait]
impl HttpDispatch for RetryingClient {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse> {
        RetryingClient::get(self, url, options).await
    }

    async fn post(&self, url: &str, body: Bytes, options: &RequestOptions) -> Result<HttpResponse> {
        RetryingClient::post(self, url, body, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::retry::TransientError;

    #[tokio::test]
    async fn test_get_returns_response_unchanged() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/subtitles/12345")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body("subtitle payload")
            .create_async()
            .await;

        let client = RetryingClient::from_parts(Client::new(), None);
        let response = client
            .get(&format!("{}/subtitles/12345", url), &RequestOptions::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.headers.get("content-type").unwrap(),
            "application/octet-stream"
        );
        assert_eq!(response.body.as_ref(), b"subtitle payload");
    }

    #[tokio::test]
    async fn test_get_does_not_retry_error_statuses() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/subtitles/12345")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let client = RetryingClient::from_parts(Client::new(), None);
        let response = client
            .get(&format!("{}/subtitles/12345", url), &RequestOptions::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_post_sends_body_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", "/upload")
            .match_header("x-session", "abc123")
            .match_body("raw bytes")
            .with_status(201)
            .create_async()
            .await;

        let client = RetryingClient::from_parts(Client::new(), None);
        let options = RequestOptions::new().header(
            HeaderName::from_static("x-session"),
            HeaderValue::from_static("abc123"),
        );
        let response = client
            .post(
                &format!("{}/upload", url),
                Bytes::from_static(b"raw bytes"),
                &options,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_retries_connection_failures_with_fixed_delay() {
        // Grab a port the OS just released so every attempt is refused.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = RetryingClient::from_parts(Client::new(), None);
        let start = tokio::time::Instant::now();
        let err = client
            .get(&format!("http://127.0.0.1:{port}/"), &RequestOptions::new())
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<TransientError>().is_some());
        // Three attempts, two fixed 5s delays.
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_malformed_url_fails_without_retry() {
        let client = RetryingClient::from_parts(Client::new(), None);
        let start = std::time::Instant::now();
        let err = client
            .get("http://[invalid", &RequestOptions::new())
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<TransientError>().is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_scaling_follows_proxy_configuration() {
        let direct = RetryingClient::from_parts(Client::new(), None);
        assert_eq!(
            direct
                .config
                .effective_timeout(Some(Duration::from_secs(10))),
            Some(Duration::from_secs(10))
        );

        let proxied = RetryingClient::from_parts(
            Client::new(),
            Some("http://proxy.example:8080".to_string()),
        );
        assert_eq!(
            proxied
                .config
                .effective_timeout(Some(Duration::from_secs(10))),
            Some(Duration::from_secs(30))
        );
    }

    #[tokio::test]
    async fn test_dispatch_trait_routes_to_client() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/ping")
            .with_status(204)
            .create_async()
            .await;

        let client: Box<dyn HttpDispatch> =
            Box::new(RetryingClient::from_parts(Client::new(), None));
        let response = client
            .get(&format!("{}/ping", url), &RequestOptions::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }
}
