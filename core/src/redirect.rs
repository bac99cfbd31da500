//! Redirect follow-up policy for the default engine.

use url::Url;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Follow-ups allowed for a single call before it is abandoned.
pub(crate) const MAX_FOLLOW_UPS: usize = 20;

const BODY_HEADERS: [&str; 3] = ["content-type", "content-length", "transfer-encoding"];

/// The request to issue next when `response` is a redirect worth following.
///
/// `None` means `response` is final and goes back to the caller as is.
pub(crate) fn follow_up(
    request: &HttpRequest,
    response: &HttpResponse,
    follow_protocol_redirects: bool,
) -> Option<HttpRequest> {
    match response.status {
        300 | 301 | 302 | 303 => {}
        307 | 308 if matches!(request.method, HttpMethod::Get | HttpMethod::Head) => {}
        _ => return None,
    }

    let location = response.header("location")?;
    let current = Url::parse(&request.url).ok()?;
    let target = current.join(location).ok()?;
    if !matches!(target.scheme(), "http" | "https") {
        return None;
    }
    if target.scheme() != current.scheme() && !follow_protocol_redirects {
        return None;
    }

    let mut next = request.clone();
    next.url = target.to_string();

    if !matches!(request.method, HttpMethod::Get | HttpMethod::Head)
        && !matches!(response.status, 307 | 308)
    {
        next.method = HttpMethod::Get;
        next.body = None;
        next.headers
            .retain(|h| !BODY_HEADERS.iter().any(|name| h.is(name)));
    }

    let same_origin = current.host_str() == target.host_str()
        && current.port_or_known_default() == target.port_or_known_default()
        && current.scheme() == target.scheme();
    if !same_origin {
        next.headers.retain(|h| !h.is("authorization"));
    }

    Some(next)
}
