//! Timeout stamping for XML-RPC connections.

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;

use super::{RpcConnection, RpcTransport};

/// Decorates a base transport so every connection it creates carries the
/// configured timeout.
///
/// Connections go over the plain path. No proxy handling, no retry;
/// stateless beyond the timeout value.
pub struct TimeoutTransport<T> {
    inner: T,
    timeout: Duration,
}

impl<T: RpcTransport> TimeoutTransport<T> {
    pub fn new(inner: T, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn make_connection(&mut self, target: &str) -> Result<RpcConnection> {
        let mut conn = self.inner.make_connection(target, false)?;
        conn.timeout = Some(self.timeout);
        Ok(conn)
    }

    pub async fn send_request(
        &mut self,
        conn: &mut RpcConnection,
        handler: &str,
        body: &[u8],
    ) -> Result<Bytes> {
        self.inner.send_request(conn, handler, body).await
    }
}
