//! Shared transport configuration and the environment boundary.
//!
//! The process environment is consulted exactly once, in
//! [`TransportConfig::from_env`]; every client and transport in this crate
//! takes an already-populated [`TransportConfig`], so nothing below this
//! module reads environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Certificate, Client, Proxy};

/// Environment variable holding the forward proxy URL, e.g. `http://host:port`.
pub const PROXY_ENV: &str = "SZ_HTTP_PROXY";

/// Factor applied to caller-supplied timeouts when a proxy is in use.
pub const PROXY_TIMEOUT_FACTOR: u32 = 3;

/// How outbound TLS connections are verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerify {
    /// The trust store bundled with the TLS backend.
    #[default]
    Bundled,
    /// A PEM certificate bundle on disk, loaded when the client is built.
    CaBundle(PathBuf),
    /// No certificate verification.
    Disabled,
}

/// Configuration shared by every client and transport in this crate.
///
/// The proxy URL is read once at construction and is immutable for the
/// lifetime of any client built from this value.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Forward proxy URL, used for both `http` and `https` traffic.
    pub proxy: Option<String>,
    /// TLS verification source.
    pub tls: TlsVerify,
}

impl TransportConfig {
    /// Reads the proxy URL from [`PROXY_ENV`]. An unset or empty variable
    /// means no proxy.
    pub fn from_env() -> Self {
        let proxy = env::var(PROXY_ENV).ok().filter(|value| !value.is_empty());
        Self {
            proxy,
            tls: TlsVerify::default(),
        }
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_tls(mut self, tls: TlsVerify) -> Self {
        self.tls = tls;
        self
    }

    /// Scales a caller-supplied timeout by [`PROXY_TIMEOUT_FACTOR`] when a
    /// proxy is configured. Proxies add hops, so direct-connection timeouts
    /// are too tight for proxied traffic.
    pub fn effective_timeout(&self, timeout: Option<Duration>) -> Option<Duration> {
        match (&self.proxy, timeout) {
            (Some(_), Some(timeout)) => Some(timeout * PROXY_TIMEOUT_FACTOR),
            (_, timeout) => timeout,
        }
    }
}

/// Builds the underlying HTTP client from a [`TransportConfig`].
///
/// One proxy URL covers both the `http` and `https` slots.
pub fn build_http_client(config: &TransportConfig) -> Result<Client> {
    let mut builder = Client::builder().use_rustls_tls();

    match &config.tls {
        TlsVerify::Bundled => {}
        TlsVerify::CaBundle(path) => {
            let pem = std::fs::read(path)
                .with_context(|| format!("Failed to read CA bundle at {}", path.display()))?;
            let certificates = Certificate::from_pem_bundle(&pem)
                .with_context(|| format!("Failed to parse CA bundle at {}", path.display()))?;
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
        TlsVerify::Disabled => {
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    if let Some(proxy) = &config.proxy {
        let proxy = Proxy::all(proxy)
            .with_context(|| format!("Invalid proxy URL {proxy:?} from {PROXY_ENV}"))?;
        builder = builder.proxy(proxy);
    }

    builder.build().context("Failed to build HTTP client")
}
