use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub name: String,
}

/// What `/echo` saw of the request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub method: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Response of the cacheable `/cached/{key}` resource.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Cached {
    pub key: String,
    pub served: u64,
}

#[derive(Default)]
pub struct Counters {
    cached_served: AtomicU64,
    per_user_served: AtomicU64,
}

pub type Shared = Arc<Counters>;

pub fn app() -> Router {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{name}", get(get_user))
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/redirect/{hops}", get(redirect))
        .route("/see-other", post(see_other))
        .route("/to-https", get(to_https))
        .route("/cached/{key}", get(cached))
        .route("/per-user", get(per_user))
        .route("/large/{len}", get(large))
        .route("/not-json", get(not_json))
        .with_state(Shared::default())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn get_user(Path(name): Path<String>) -> Json<User> {
    Json(User { name })
}

async fn create_user(Json(input): Json<User>) -> (StatusCode, Json<User>) {
    (StatusCode::CREATED, Json(input))
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let headers = headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();
    Json(Echo {
        method: method.to_string(),
        content_type,
        headers,
        body,
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, Json(json!({ "status": code }))).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn redirect(Path(hops): Path<u32>) -> Response {
    if hops == 0 {
        return Json(User {
            name: "redirected".to_string(),
        })
        .into_response();
    }
    let location = format!("/redirect/{}", hops - 1);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn see_other() -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, "/users/created")]).into_response()
}

async fn to_https(headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let location = format!("https://{host}/users/secure");
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

async fn cached(State(counters): State<Shared>, Path(key): Path<String>) -> Response {
    let served = counters.cached_served.fetch_add(1, Ordering::SeqCst) + 1;
    (
        [(header::CACHE_CONTROL, "max-age=60")],
        Json(Cached { key, served }),
    )
        .into_response()
}

/// Cacheable per caller: `key` is the `Authorization` value it was served for.
async fn per_user(State(counters): State<Shared>, headers: HeaderMap) -> Response {
    let served = counters.per_user_served.fetch_add(1, Ordering::SeqCst) + 1;
    let key = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    (
        [
            (header::CACHE_CONTROL, "private, max-age=60"),
            (header::VARY, "Authorization"),
        ],
        Json(Cached { key, served }),
    )
        .into_response()
}

/// A JSON string of `len` ASCII characters.
async fn large(Path(len): Path<usize>) -> Json<String> {
    Json("x".repeat(len))
}

async fn not_json() -> &'static str {
    "definitely not json"
}
