//! Fixed-policy retry for transient network failures.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use anyhow::{Result, anyhow};

/// Maximum number of attempts for a network operation.
pub const MAX_ATTEMPTS: usize = 3;

/// Fixed delay between attempts. Not exponential; total elapsed time is
/// bounded by `MAX_ATTEMPTS` and this value.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Transient failures worth retrying.
///
/// Each variant carries the text of the underlying error. Anything that does
/// not classify as one of these kinds propagates on the first attempt.
#[derive(Debug)]
pub enum TransientError {
    /// TCP-level connection failure (refused, reset, dropped).
    Connection(String),
    /// Failure while talking to the configured forward proxy.
    Proxy(String),
    /// TLS handshake or certificate failure.
    Tls(String),
    /// Overall request deadline exceeded.
    Timeout(String),
    /// Deadline exceeded while establishing the connection.
    ConnectTimeout(String),
    /// Deadline exceeded while reading the response.
    ReadTimeout(String),
    /// Socket-level timeout surfaced below the HTTP layer.
    SocketTimeout(String),
}

impl TransientError {
    /// Classifies a transport error into a retryable kind, if it is one.
    ///
    /// HTTP-level error statuses never classify: they are not transport
    /// failures and must not be retried here.
    pub fn classify(error: &reqwest::Error) -> Option<Self> {
        let detail = chain_text(error);
        let lower = detail.to_lowercase();

        if error.is_timeout() {
            return Some(if error.is_connect() {
                TransientError::ConnectTimeout(detail)
            } else if error.is_body() || error.is_decode() {
                TransientError::ReadTimeout(detail)
            } else {
                TransientError::Timeout(detail)
            });
        }

        if error.is_connect() {
            return Some(if lower.contains("proxy") {
                TransientError::Proxy(detail)
            } else if lower.contains("tls") || lower.contains("ssl") || lower.contains("certificate")
            {
                TransientError::Tls(detail)
            } else {
                TransientError::Connection(detail)
            });
        }

        if io_kind(error) == Some(io::ErrorKind::TimedOut) {
            return Some(TransientError::SocketTimeout(detail));
        }

        if lower.contains("connection reset")
            || lower.contains("connection closed")
            || lower.contains("broken pipe")
        {
            return Some(TransientError::Connection(detail));
        }

        None
    }
}

impl std::fmt::Display for TransientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientError::Connection(msg) => write!(f, "Connection error: {}", msg),
            TransientError::Proxy(msg) => write!(f, "Proxy error: {}", msg),
            TransientError::Tls(msg) => write!(f, "TLS error: {}", msg),
            TransientError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            TransientError::ConnectTimeout(msg) => write!(f, "Connect timeout: {}", msg),
            TransientError::ReadTimeout(msg) => write!(f, "Read timeout: {}", msg),
            TransientError::SocketTimeout(msg) => write!(f, "Socket timeout: {}", msg),
        }
    }
}

impl std::error::Error for TransientError {}

/// Wraps a transport error for the retry loop: transient kinds become
/// [`TransientError`], everything else passes through unchanged.
pub fn check_transient(error: reqwest::Error) -> anyhow::Error {
    match TransientError::classify(&error) {
        Some(kind) => anyhow::Error::from(kind),
        None => anyhow::Error::from(error),
    }
}

fn is_transient(error: &anyhow::Error) -> bool {
    error.downcast_ref::<TransientError>().is_some()
}

/// Concatenates the error with its source chain, for classification and
/// for the text carried in [`TransientError`].
fn chain_text(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// Finds the first `std::io::Error` in the source chain and returns its kind.
fn io_kind(error: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source = error.source();
    while let Some(inner) = source {
        if let Some(io_error) = inner.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
        source = inner.source();
    }
    None
}

/// Executes an async operation with the fixed retry policy: up to
/// [`MAX_ATTEMPTS`] attempts with [`RETRY_DELAY`] between them, retrying
/// only errors that downcast to [`TransientError`]. Any other error returns
/// immediately; once attempts are exhausted the last error is returned.
pub async fn with_retry<F, Fut, T>(operation_name: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 1..=MAX_ATTEMPTS {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_transient(&e) {
                    return Err(e);
                }

                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow!("{}: failed after {} attempts", operation_name, MAX_ATTEMPTS)))
}
