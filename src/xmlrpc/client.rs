//! XML-RPC calls carried over the generic HTTP client.

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use reqwest::header::{HeaderValue, USER_AGENT};

use super::{ProtocolError, ResponseParser};
use crate::config::TransportConfig;
use crate::http::{HttpDispatch, RequestOptions, RetryingClient};

/// User-Agent announced by [`HttpBackedTransport`] unless overridden.
pub const DEFAULT_USER_AGENT: &str = concat!("subtransport/", env!("CARGO_PKG_VERSION"));

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// XML-RPC transport that performs calls through an HTTP-capable client
/// instead of a raw socket transport, reusing the client's connection
/// handling, proxy support, and TLS verification.
///
/// Retry is not duplicated here; inject a [`RetryingClient`] to get it.
pub struct HttpBackedTransport<C, P> {
    client: C,
    parser: P,
    use_https: bool,
    user_agent: String,
    timeout: Duration,
}

impl<P: ResponseParser> HttpBackedTransport<RetryingClient, P> {
    /// Assembles the transport on top of the default retrying client, with
    /// TLS verification and proxying taken from `config`.
    pub fn with_default_client(parser: P, config: TransportConfig) -> Result<Self> {
        Ok(Self::new(RetryingClient::new(config)?, parser))
    }
}

impl<C: HttpDispatch, P: ResponseParser> HttpBackedTransport<C, P> {
    pub fn new(client: C, parser: P) -> Self {
        Self {
            client,
            parser,
            use_https: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn use_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Makes one XML-RPC call: POSTs `body` to `host` + `handler` and runs
    /// the response through the parser.
    ///
    /// HTTP error statuses become [`ProtocolError`]; errors from the client
    /// propagate unchanged.
    #[tracing::instrument(skip(self, body))]
    pub async fn request(&self, host: &str, handler: &str, body: Bytes) -> Result<P::Output> {
        let url = self.build_url(host, handler);
        let options = RequestOptions::new()
            .timeout(self.timeout)
            .header(USER_AGENT, HeaderValue::from_str(&self.user_agent)?);

        let response = self.client.post(&url, body, &options).await?;

        if response.status.is_client_error() || response.status.is_server_error() {
            let message = response
                .status
                .canonical_reason()
                .unwrap_or("unrecognized status")
                .to_string();
            return Err(ProtocolError {
                url,
                status: response.status,
                message,
                headers: response.headers,
            }
            .into());
        }

        self.parser.parse_response(&response.body)
    }

    fn build_url(&self, host: &str, handler: &str) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        let handler = handler.strip_prefix('/').unwrap_or(handler);
        format!("{scheme}://{host}/{handler}")
    }
}
