//! Proxy and timeout support for the secure XML-RPC transport.

use std::time::Duration;

use anyhow::{Result, anyhow};
use bytes::Bytes;
use log::debug;

use super::{RpcConnection, RpcTransport};
use crate::config::TransportConfig;

/// Decorates the secure transport with proxy redirection and timeouts.
///
/// With a proxy configured, connections are dialed to the proxy's host:port
/// while the request line keeps addressing the original target, and the
/// configured timeout is tripled. Whether the dial uses TLS follows the
/// proxy URL's scheme once a proxy is set, not the target's.
///
/// One instance serves one logical target: `make_connection` remembers the
/// last target it saw (last call wins) and `send_request` addresses that
/// target. Methods take `&mut self`, so an instance cannot be shared across
/// concurrent callers; create one instance per session.
pub struct SecureProxyTransport<T> {
    inner: T,
    timeout: Option<Duration>,
    scheme: String,
    secure: bool,
    proxy: Option<String>,
    host: Option<String>,
}

impl<T: RpcTransport> SecureProxyTransport<T> {
    /// `url` is the endpoint the transport will serve; its scheme decides
    /// the request-line scheme and the initial connection security.
    pub fn new(inner: T, timeout: Option<Duration>, url: &str, config: &TransportConfig) -> Self {
        let scheme = url
            .split_once("://")
            .map_or("http", |(scheme, _)| scheme)
            .to_string();
        let mut secure = url.starts_with("https");
        let proxy = config.proxy.clone();

        if let Some(proxy) = &proxy {
            debug!("Using proxy {} for: {}", proxy, url);
            secure = proxy.starts_with("https");
        }
        let timeout = config.effective_timeout(timeout);

        Self {
            inner,
            timeout,
            scheme,
            secure,
            proxy,
            host: None,
        }
    }

    /// Dials the physical target (the proxy when one is configured) and
    /// stamps the effective timeout on the connection.
    pub fn make_connection(&mut self, target: &str) -> Result<RpcConnection> {
        self.host = Some(target.to_string());
        let dial = match &self.proxy {
            Some(proxy) => strip_scheme(proxy).to_string(),
            None => target.to_string(),
        };

        let mut conn = self.inner.make_connection(&dial, self.secure)?;
        conn.timeout = self.timeout;
        Ok(conn)
    }

    /// Rewrites `handler` into a full URL addressing the remembered target
    /// before delegating, so a proxied connection still names the logical
    /// endpoint in its request line.
    pub async fn send_request(
        &mut self,
        conn: &mut RpcConnection,
        handler: &str,
        body: &[u8],
    ) -> Result<Bytes> {
        let host = self
            .host
            .as_deref()
            .ok_or_else(|| anyhow!("send_request called before make_connection"))?;
        let handler = format!("{}://{}{}", self.scheme, host, handler);
        self.inner.send_request(conn, &handler, body).await
    }
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}
