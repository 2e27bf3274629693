//! Ingress route definitions

use axum::body::Body;
use axum::http::Request;
use axum::routing::any;
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::{cors, RequestLogging};
use super::server::AppState;

/// Create the ingress router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(handlers::health::service_info))
        .route("/health", any(handlers::health::health_check))
        .route("/metrics", any(handlers::health::metrics))
        // Proxy prefix or 404
        .fallback(handlers::proxy::forward)
        .with_state(state)
        .layer(axum::middleware::from_fn(cors))
        .layer(axum::middleware::from_fn(RequestLogging::log_request))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::debug_span!("request", method = %req.method(), path = %req.uri().path())
            }),
        )
}
