//! Error types for the JSON network client.
//!
//! # Design
//! One `ClientError` variant per failure class a caller may want to react
//! to: the server answered with a non-2xx status, the server could not be
//! reached, the codec rejected the body, or something that indicates a
//! programming error. Callers pattern-match instead of downcasting.

use thiserror::Error;

use crate::codec::CodecError;

/// Boxed error used to carry an underlying cause across layers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by `JsonNetworkClient::execute`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server responded with a non-2xx status. The body is not parsed.
    #[error("HTTP {code} {message}")]
    Status { code: u16, message: String },

    /// No response could be obtained: DNS, connect, timeout, TLS or a broken
    /// stream.
    #[error("no connection: {0}")]
    Connectivity(#[source] BoxError),

    /// Request reuse, a malformed request descriptor, or any other
    /// unexpected failure.
    #[error("unexpected failure: {0}")]
    Runtime(#[source] BoxError),

    /// The codec could not encode the payload or decode the response body.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// `execute` was called on a context that was never initialized or has
    /// been shut down.
    #[error("network client is not initialized")]
    NotInitialized,
}

impl ClientError {
    pub(crate) fn runtime(cause: impl Into<BoxError>) -> Self {
        ClientError::Runtime(cause.into())
    }

    /// Status code for `Status` errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// A request descriptor that cannot be turned into a request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request url is empty")]
    EmptyUrl,

    #[error("invalid request url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported url scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    #[error("method {0} must not have a request body")]
    BodyNotPermitted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_displays_code_and_message() {
        let err = ClientError::Status {
            code: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404 Not Found");
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn connectivity_error_exposes_its_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ClientError::Connectivity(Box::new(cause));
        let source = std::error::Error::source(&err).unwrap();
        let io = source.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn request_errors_wrap_as_runtime() {
        let err = ClientError::runtime(RequestError::EmptyUrl);
        assert!(matches!(err, ClientError::Runtime(_)));
        assert!(err.to_string().contains("url is empty"));
    }
}
