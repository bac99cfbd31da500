//! The HTTP engine boundary.
//!
//! # Design
//! Everything that touches sockets lives behind `HttpEngine`: connection
//! pooling, redirects, caching and TLS. The executor only builds requests and
//! classifies responses, so tests swap in an in-memory engine and the
//! default `UreqEngine` can be replaced without touching the executor.

use thiserror::Error;

use crate::cache::DiskCache;
use crate::error::BoxError;
use crate::http::{HttpRequest, HttpResponse};

/// Failure to obtain a response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O level failure: DNS, connect, timeout, TLS, interrupted stream.
    #[error("I/O failure: {0}")]
    Io(#[source] BoxError),

    /// The engine refused the request or is in an unexpected state, e.g. the
    /// request was already consumed.
    #[error("engine failure: {0}")]
    Other(#[source] BoxError),
}

/// Performs HTTP exchanges on behalf of the executor.
///
/// Implementations are shared across threads; `execute` takes `&self` and
/// must be safe to call concurrently.
pub trait HttpEngine: Send + Sync {
    /// Perform the exchange. Non-2xx statuses are responses, not errors.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Stop background workers immediately, abandoning queued work.
    fn shutdown_workers(&self) {}

    /// Close every pooled connection.
    fn evict_connections(&self) {}

    /// The response cache, when one is configured.
    fn cache(&self) -> Option<&DiskCache> {
        None
    }
}
