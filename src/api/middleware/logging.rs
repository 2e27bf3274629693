//! Request logging middleware

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::debug;

/// Request logging middleware
pub struct RequestLogging;

impl RequestLogging {
    /// Log method, path and outcome. Query strings and header values are
    /// left out; they carry credentials and signatures.
    pub async fn log_request(req: Request<Body>, next: Next) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let start = Instant::now();

        let response = next.run(req).await;

        debug!(
            "{} {} - {} in {:?}",
            method,
            path,
            response.status(),
            start.elapsed()
        );

        response
    }
}
