//! Proxy route: everything under the proxy prefix goes upstream

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, Response};

use crate::api::server::AppState;
use crate::error::RelayError;

/// Fallback handler. Paths under the proxy prefix are forwarded unchanged,
/// anything else is a 404.
pub async fn forward(
    State(state): State<AppState>,
    req: Request<Body>,
) -> Result<Response<Body>, RelayError> {
    if !req
        .uri()
        .path()
        .starts_with(state.config.upstream.proxy_prefix.as_str())
    {
        return Err(RelayError::NotFound);
    }

    state.forwarder.forward(req).await
}
