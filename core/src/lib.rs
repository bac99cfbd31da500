//! Synchronous JSON-over-HTTP client.
//!
//! # Overview
//! Treats a remote JSON endpoint as a typed function call: one blocking
//! request in, one decoded value (or one typed error) out.
//!
//! # Design
//! - `NetworkContext` owns the shared `HttpEngine`; it is explicit,
//!   application-owned state with `initialize` / `shutdown_now`, not a global.
//! - `JsonNetworkClient` borrows the context and is generic over a
//!   `JsonCodec`, so alternative codecs are injected by construction.
//! - Request building and response classification are pure functions over
//!   the plain-data `HttpRequest` / `HttpResponse`; only the engine does I/O.
//! - `UreqEngine` is the default engine: pooled blocking connections,
//!   redirect policy and an optional disk cache.
//! - Lifecycle calls need `&mut NetworkContext`, so they cannot overlap calls
//!   made through clients that borrow the same context.

pub mod agent;
pub mod cache;
pub mod client;
pub mod codec;
pub mod context;
pub mod engine;
pub mod error;
pub mod http;
mod redirect;
pub mod settings;

pub use agent::{TooManyFollowUps, UreqEngine};
pub use cache::DiskCache;
pub use client::{build_request, parse_response, JsonNetworkClient};
pub use codec::{CodecError, JsonCodec, SerdeJsonCodec};
pub use context::NetworkContext;
pub use engine::{HttpEngine, TransportError};
pub use error::{BoxError, ClientError, RequestError};
pub use http::{Header, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use settings::Settings;
