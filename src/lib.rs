//! Resilient HTTP and XML-RPC client transports for subtitle providers.
//!
//! Outbound calls get automatic retry on transient network failure, optional
//! proxying through an environment-configured HTTP proxy, TLS verification
//! via the bundled trust store, and timeout scaling when a proxy is in use.

pub mod config;
pub mod http;
pub mod xmlrpc;
