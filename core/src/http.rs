//! HTTP transport types shared by the executor and the engine.
//!
//! # Design
//! Requests and responses are plain data. The executor builds an
//! `HttpRequest`, hands it to an `HttpEngine` for the actual network
//! exchange, and classifies the returned `HttpResponse`. Nothing in this
//! module touches the network, so the build and classify halves stay
//! deterministic and easy to test against in-memory engines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// Content type attached to every request body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// An immutable key/value header pair.
///
/// A request carries an ordered sequence of these. Duplicate keys are allowed
/// and are sent in the order they were supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    key: String,
    value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Case-insensitive key comparison, as HTTP header names are.
    pub fn is(&self, name: &str) -> bool {
        self.key.eq_ignore_ascii_case(name)
    }
}

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    /// Any other syntactically valid method token, e.g. `PROPFIND`.
    Other(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Other(token) => token.as_str(),
        }
    }

    /// False for GET and HEAD, which never carry a request body. Every other
    /// method is sent with one, zero-length when there is no payload.
    pub fn permits_body(&self) -> bool {
        !matches!(self, HttpMethod::Get | HttpMethod::Head)
    }
}

impl FromStr for HttpMethod {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            "GET" => HttpMethod::Get,
            "HEAD" => HttpMethod::Head,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "OPTIONS" => HttpMethod::Options,
            other if is_token(other) => HttpMethod::Other(other.to_string()),
            other => return Err(RequestError::InvalidMethod(other.to_string())),
        };
        Ok(method)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 7230 `token`: what method names and header names are made of.
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// A request body together with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl RequestBody {
    /// Wrap a payload as a JSON body. `None` yields a zero-length body.
    pub fn json(payload: Option<&[u8]>) -> Self {
        Self {
            content_type: CONTENT_TYPE_JSON.to_string(),
            bytes: payload.map(<[u8]>::to_vec).unwrap_or_default(),
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `build_request` and consumed by an `HttpEngine`. `body` is `None`
/// only when the method forbids a body or none was asked for; a present body
/// may still be zero-length.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|h| h.is(name)).map(Header::value)
    }
}

/// An HTTP response described as plain data.
///
/// Produced by an `HttpEngine` after the exchange completes, then classified
/// by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    /// Status message, e.g. `Not Found`.
    pub reason: String,
    pub headers: Vec<Header>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|h| h.is(name)).map(Header::value)
    }
}
