//! Default `HttpEngine` over a blocking `ureq` agent.
//!
//! # Design
//! ureq owns sockets, the connection pool and TLS. Status codes come back as
//! data (`http_status_as_error(false)`) and ureq's own redirect handling is
//! disabled so that the redirect settings, including the protocol switch
//! rule, are applied here hop by hop. Method tokens outside the standard set
//! are passed through and response bodies are read without a size cap. GET
//! exchanges go through the disk cache when one is configured.

use std::sync::RwLock;

use thiserror::Error;
use tracing::debug;
use ureq::Agent;

use crate::cache::{self, DiskCache};
use crate::engine::{HttpEngine, TransportError};
use crate::http::{Header, HttpMethod, HttpRequest, HttpResponse};
use crate::redirect::{self, MAX_FOLLOW_UPS};
use crate::settings::Settings;

/// Raised when a call keeps redirecting past the follow-up limit.
#[derive(Debug, Error)]
#[error("too many follow-up requests: {0}")]
pub struct TooManyFollowUps(pub usize);

/// Blocking engine backed by a pooled `ureq::Agent`.
pub struct UreqEngine {
    settings: Settings,
    agent: RwLock<Agent>,
    cache: Option<DiskCache>,
}

impl UreqEngine {
    pub fn new(settings: &Settings) -> Self {
        let cache = settings
            .cache_directory
            .as_ref()
            .map(|dir| DiskCache::open(dir.clone(), settings.max_cache_size_bytes));
        Self {
            settings: settings.clone(),
            agent: RwLock::new(build_agent(settings)),
            cache,
        }
    }

    /// The settings this engine was built from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn agent(&self) -> Agent {
        self.agent.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn follow(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut current = request;
        let mut follow_ups = 0;
        loop {
            let response = self.send(&current)?;
            if !self.settings.follow_redirects {
                return Ok(response);
            }
            let Some(next) = redirect::follow_up(
                &current,
                &response,
                self.settings.follow_protocol_redirects,
            ) else {
                return Ok(response);
            };

            follow_ups += 1;
            if follow_ups > MAX_FOLLOW_UPS {
                return Err(TransportError::Io(Box::new(TooManyFollowUps(follow_ups))));
            }
            debug!(
                status = response.status,
                from = %current.url,
                to = %next.url,
                "following redirect"
            );
            current = next;
        }
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for header in &request.headers {
            // A present body decides the content type.
            if request.body.is_some() && header.is("content-type") {
                continue;
            }
            builder = builder.header(header.key(), header.value());
        }

        let agent = self.agent();
        let result = match &request.body {
            Some(body) => {
                let outgoing = builder
                    .header("Content-Type", body.content_type.as_str())
                    .body(body.bytes.as_slice())
                    .map_err(|e| TransportError::Other(Box::new(e)))?;
                agent.run(outgoing)
            }
            None => {
                let outgoing = builder
                    .body(())
                    .map_err(|e| TransportError::Other(Box::new(e)))?;
                agent.run(outgoing)
            }
        };
        let mut response = result.map_err(transport_error)?;

        let status = response.status();
        let headers = response_headers(response.headers());
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_string()
            .map_err(transport_error)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

impl HttpEngine for UreqEngine {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let cache = self
            .cache
            .as_ref()
            .filter(|_| request.method == HttpMethod::Get);

        if let Some(cache) = cache.filter(|_| !cache::bypasses_cache(&request.headers)) {
            if let Some(hit) = cache.get(&request.url, &request.headers) {
                debug!(url = %request.url, "served from cache");
                return Ok(hit);
            }
        }

        let url = request.url.clone();
        let request_headers = cache.map(|_| request.headers.clone()).unwrap_or_default();
        let response = self.follow(request)?;

        if let Some(cache) = cache {
            match cache.put(&url, &request_headers, &response) {
                Ok(true) => debug!(url = %url, "stored in cache"),
                Ok(false) => {}
                Err(e) => debug!(url = %url, error = %e, "cache write failed"),
            }
        }
        Ok(response)
    }

    /// The blocking agent runs every exchange on the caller's thread, so there
    /// is no worker pool to stop.
    fn shutdown_workers(&self) {}

    fn evict_connections(&self) {
        let fresh = build_agent(&self.settings);
        *self.agent.write().unwrap_or_else(|e| e.into_inner()) = fresh;
    }

    fn cache(&self) -> Option<&DiskCache> {
        self.cache.as_ref()
    }
}

fn build_agent(settings: &Settings) -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(0)
        .allow_non_standard_methods(true)
        .timeout_connect(settings.connect_timeout())
        .timeout_global(settings.call_timeout())
        .build()
        .new_agent()
}

/// Header values are kept even when they are not visible ASCII; invalid
/// UTF-8 is replaced rather than the header dropped.
fn response_headers(map: &ureq::http::HeaderMap) -> Vec<Header> {
    map.iter()
        .map(|(name, value)| {
            Header::new(name.as_str(), String::from_utf8_lossy(value.as_bytes()))
        })
        .collect()
}

fn transport_error(err: ureq::Error) -> TransportError {
    let connectivity = matches!(
        err,
        ureq::Error::Io(_)
            | ureq::Error::Timeout(_)
            | ureq::Error::HostNotFound
            | ureq::Error::ConnectionFailed
    );
    if connectivity {
        TransportError::Io(Box::new(err))
    } else {
        TransportError::Other(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_follows_settings() {
        let dir = tempfile::tempdir().unwrap();
        let engine = UreqEngine::new(&Settings::default().with_cache(dir.path(), 4096));
        let cache = engine.cache().unwrap();
        assert_eq!(cache.directory(), dir.path());
        assert_eq!(cache.max_size(), 4096);

        assert!(UreqEngine::new(&Settings::default()).cache().is_none());
    }

    #[test]
    fn refused_connection_is_an_io_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let engine = UreqEngine::new(&Settings::default());
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: format!("http://{addr}/"),
            headers: Vec::new(),
            body: None,
        };
        let err = engine.execute(request).unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn non_ascii_header_values_are_kept() {
        use ureq::http::{HeaderMap, HeaderValue};

        let mut map = HeaderMap::new();
        map.insert("x-city", HeaderValue::from_bytes(b"caf\xc3\xa9").unwrap());
        map.append("x-raw", HeaderValue::from_bytes(b"a\xffb").unwrap());
        map.append("x-raw", HeaderValue::from_static("plain"));

        let headers = response_headers(&map);
        assert_eq!(headers.len(), 3);
        assert!(headers.contains(&Header::new("x-city", "café")));
        assert!(headers.contains(&Header::new("x-raw", "a\u{fffd}b")));
        assert!(headers.contains(&Header::new("x-raw", "plain")));
    }

    #[test]
    fn evicting_connections_keeps_engine_usable() {
        let engine = UreqEngine::new(&Settings::default());
        engine.evict_connections();
        engine.shutdown_workers();
        assert!(engine.settings().follow_redirects);
    }
}
