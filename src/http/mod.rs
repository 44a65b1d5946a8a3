//! Generic HTTP client with retry, proxy, and timeout handling.

mod client;
mod retry;

pub use client::{HttpDispatch, HttpResponse, RequestOptions, RetryingClient};
pub use retry::{MAX_ATTEMPTS, RETRY_DELAY, TransientError, check_transient, with_retry};

#[cfg(test)]
pub use client::MockHttpDispatch;
