//! Request executor and response classifier.
//!
//! # Design
//! `JsonNetworkClient` borrows a `NetworkContext` and owns a codec. Each call
//! is split the same way throughout: `build_request` turns the descriptor
//! into an `HttpRequest`, the context's engine performs the exchange, and
//! `parse_response` either decodes the body or reports the status. Both
//! halves are pure and tested without a network.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::codec::{JsonCodec, SerdeJsonCodec};
use crate::context::NetworkContext;
use crate::engine::TransportError;
use crate::error::{ClientError, RequestError};
use crate::http::{is_token, Header, HttpMethod, HttpRequest, HttpResponse, RequestBody};

/// Synchronous client that treats a JSON endpoint as a typed function call.
///
/// Blocks the calling thread for the whole exchange. Run calls on separate
/// threads for concurrency; the context is shared read-only between them.
pub struct JsonNetworkClient<'ctx, C = SerdeJsonCodec> {
    context: &'ctx NetworkContext,
    codec: C,
}

impl<'ctx> JsonNetworkClient<'ctx> {
    pub fn new(context: &'ctx NetworkContext) -> Self {
        Self::with_codec(context, SerdeJsonCodec)
    }
}

impl<'ctx, C: JsonCodec> JsonNetworkClient<'ctx, C> {
    pub fn with_codec(context: &'ctx NetworkContext, codec: C) -> Self {
        Self { context, codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Perform one request and decode the 2xx response body into `T`.
    ///
    /// `payload` is sent as an `application/json` body. Fails with
    /// `ClientError::Status` on a non-2xx response, `Connectivity` when no
    /// response could be obtained, `Codec` when the body does not decode, and
    /// `NotInitialized` when the context has no engine.
    pub fn execute<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        headers: &[Header],
        payload: Option<&[u8]>,
    ) -> Result<T, ClientError> {
        let request = build_request(url, method, headers, payload).map_err(ClientError::runtime)?;
        let engine = self.context.engine().ok_or(ClientError::NotInitialized)?;

        debug!(
            method = %request.method,
            url = %request.url,
            headers = request.headers.len(),
            "executing request"
        );
        let response = match engine.execute(request) {
            Ok(response) => response,
            Err(TransportError::Io(cause)) => {
                info!(error = %cause, "couldn't execute request due to connectivity issues: {url}");
                return Err(ClientError::Connectivity(cause));
            }
            Err(TransportError::Other(cause)) => {
                info!(error = %cause, "request could not be executed: {url}");
                return Err(ClientError::Runtime(cause));
            }
        };
        debug!(status = response.status, url, "received response");

        parse_response(&self.codec, &response)
    }

    /// Encode `body` with the codec, then `execute` with it as payload.
    pub fn execute_json<B, T>(
        &self,
        url: &str,
        method: &str,
        headers: &[Header],
        body: &B,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let json = self.codec.to_json(body)?;
        self.execute(url, method, headers, Some(json.as_bytes()))
    }
}

/// Turn a request descriptor into an `HttpRequest`.
///
/// Headers keep their order and duplicates. The URL is sent in its normalized
/// form (percent-encoded path, punycode host). Every method except GET and
/// HEAD carries a JSON body, zero-length without a payload; GET and HEAD
/// never get one.
pub fn build_request(
    url: &str,
    method: &str,
    headers: &[Header],
    payload: Option<&[u8]>,
) -> Result<HttpRequest, RequestError> {
    if url.trim().is_empty() {
        return Err(RequestError::EmptyUrl);
    }
    let parsed = Url::parse(url).map_err(|source| RequestError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RequestError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    let method: HttpMethod = method.parse()?;
    for header in headers {
        if !is_token(header.key()) || header.value().contains(['\r', '\n']) {
            return Err(RequestError::InvalidHeader(header.key().to_string()));
        }
    }

    let body = match payload {
        Some(_) if !method.permits_body() => {
            return Err(RequestError::BodyNotPermitted(method.to_string()))
        }
        Some(bytes) => Some(RequestBody::json(Some(bytes))),
        None if method.permits_body() => Some(RequestBody::json(None)),
        None => None,
    };

    Ok(HttpRequest {
        method,
        url: String::from(parsed),
        headers: headers.to_vec(),
        body,
    })
}

/// Classify a response: decode a 2xx body or report the status.
///
/// An empty 2xx body decodes as JSON `null`.
pub fn parse_response<C, T>(codec: &C, response: &HttpResponse) -> Result<T, ClientError>
where
    C: JsonCodec,
    T: DeserializeOwned,
{
    check_status(response)?;
    let body = match response.body.trim() {
        "" => "null",
        _ => response.body.as_str(),
    };
    Ok(codec.from_json(body)?)
}

fn check_status(response: &HttpResponse) -> Result<(), ClientError> {
    if response.is_successful() {
        return Ok(());
    }
    Err(ClientError::Status {
        code: response.status,
        message: response.reason.clone(),
    })
}
