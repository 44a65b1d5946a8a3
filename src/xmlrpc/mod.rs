//! XML-RPC transport decorators.
//!
//! Subtitle providers speak XML-RPC through a pluggable transport. This
//! module defines the transport seam ([`RpcTransport`], [`ResponseParser`])
//! and three decorators over it: [`TimeoutTransport`] stamps timeouts on
//! connections, [`SecureProxyTransport`] adds proxy redirection to the
//! secure transport, and [`HttpBackedTransport`] carries the whole exchange
//! over the generic HTTP client instead of a raw socket transport.

mod client;
mod proxy;
mod timeout;

pub use client::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, HttpBackedTransport};
pub use proxy::SecureProxyTransport;
pub use timeout::TimeoutTransport;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

/// Connection handle produced by a base transport.
///
/// Decorators adjust the handle (timeout, target) before requests are sent
/// over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConnection {
    /// Physical connection target, `host` or `host:port`, without a scheme.
    pub target: String,
    /// Socket timeout applied to the connection.
    pub timeout: Option<Duration>,
}

impl RpcConnection {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            timeout: None,
        }
    }
}

/// The pluggable piece of an XML-RPC client that owns connections and the
/// request/response byte exchange.
///
/// `secure` selects the TLS connection path; TLS material belongs to the
/// implementation. Methods take `&mut self`: a transport instance serves one
/// session at a time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Opens a connection to `target`.
    fn make_connection(&mut self, target: &str, secure: bool) -> Result<RpcConnection>;

    /// Sends one request addressed at `handler` over `conn` and returns the
    /// raw response body.
    async fn send_request(
        &mut self,
        conn: &mut RpcConnection,
        handler: &str,
        body: &[u8],
    ) -> Result<Bytes>;
}

/// Parses raw XML-RPC method-response bodies.
///
/// Kept as a seam so this crate stays a transport layer; the XML-RPC data
/// model lives with the caller.
#[cfg_attr(test, mockall::automock(type Output = String;))]
pub trait ResponseParser: Send + Sync {
    type Output;

    fn parse_response(&self, body: &[u8]) -> Result<Self::Output>;
}

/// HTTP-level failure of an XML-RPC call carried over HTTP.
///
/// Raised when the server answers with an error status; never retried.
#[derive(Debug)]
pub struct ProtocolError {
    pub url: String,
    pub status: StatusCode,
    pub message: String,
    pub headers: HeaderMap,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "protocol error for {}: {} {}",
            self.url,
            self.status.as_u16(),
            self.message
        )
    }
}

impl std::error::Error for ProtocolError {}
