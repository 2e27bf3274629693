//! Local upstream used by the forwarding tests

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, Request};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

use crate::config::Config;

/// Config pointing at `origin`, with deadlines short enough for tests.
pub fn test_config(origin: String) -> Config {
    let mut config = Config::default();
    config.upstream.origin = origin;
    config.upstream.pool_timeout = Duration::from_secs(1);
    config.upstream.handshake_timeout = Duration::from_secs(1);
    config.upstream.response_header_timeout = Duration::from_millis(500);
    config.upstream.request_timeout = Duration::from_millis(1500);
    config
}

/// An origin nothing is listening on.
pub async fn dead_origin() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Start a fake upstream API on an ephemeral port.
pub async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/api/v1/market/tickers", get(tickers))
        .route("/api/echo/*rest", any(echo))
        .route("/api/items/:id", get(item))
        .route("/api/hop", get(hop_headers))
        .route("/api/slow", get(slow))
        .route("/api/stall", get(stall));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn tickers(
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    req: Request,
) -> Json<Value> {
    let inst_id = params.get("instId").cloned().unwrap_or_default();
    let access_key = headers
        .get("access-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    Json(json!({
        "code": "0",
        "msg": "",
        "data": [{ "instId": inst_id, "last": "64000.1" }],
        "echo": {
            "path": req.uri().path(),
            "query": req.uri().query(),
            "access_key": access_key,
        },
    }))
}

async fn echo(req: Request) -> Json<Value> {
    let (parts, body) = req.into_parts();

    let mut headers = Map::new();
    for name in parts.headers.keys() {
        let values: Vec<Value> = parts
            .headers
            .get_all(name)
            .iter()
            .map(|v| Value::from(v.to_str().unwrap_or_default()))
            .collect();
        headers.insert(name.as_str().to_string(), Value::Array(values));
    }

    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    Json(json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn item(Path(id): Path<u32>) -> Response {
    ([("x-item-id", id.to_string())], Json(json!({ "id": id }))).into_response()
}

async fn hop_headers() -> Response {
    (
        StatusCode::OK,
        [
            ("keep-alive", "timeout=5"),
            ("proxy-authenticate", "Basic realm=\"upstream\""),
            ("x-upstream", "yes"),
        ],
        "hop",
    )
        .into_response()
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late"
}

async fn stall() -> Response {
    let chunks = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(b"partial")) })
        .chain(stream::pending());
    Body::from_stream(chunks).into_response()
}
