//! Upstream forwarder
//!
//! One upstream attempt per inbound request:
//! `received -> url-built -> dispatched -> relay-complete | error-returned`.
//! Nothing is retried; the caller decides whether to try again.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Method, Request, Response, Uri};
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

use crate::config::UpstreamConfig;
use crate::error::{RelayError, Result};
use crate::proxy::body::RelayBody;
use crate::proxy::headers::{copy_end_to_end, outbound_headers};
use crate::proxy::runtime::RelayRuntime;

pub struct Forwarder {
    runtime: Arc<RelayRuntime>,
    origin: String,
    request_timeout: Duration,
    response_header_timeout: Duration,
    debug: bool,
}

impl Forwarder {
    pub fn new(runtime: Arc<RelayRuntime>, config: &UpstreamConfig, debug: bool) -> Self {
        Self {
            runtime,
            origin: config.origin.clone(),
            request_timeout: config.request_timeout,
            response_header_timeout: config.response_header_timeout,
            debug,
        }
    }

    /// Forward an inbound request to the upstream origin and relay the
    /// response. Dropping the returned future cancels the upstream call.
    #[instrument(skip(self, req), fields(method = %req.method(), path = %req.uri().path()))]
    pub async fn forward(&self, req: Request<Body>) -> Result<Response<Body>> {
        let deadline = Instant::now() + self.request_timeout;

        let target = build_upstream_uri(&self.origin, req.uri())?;
        let (parts, body) = req.into_parts();
        let outbound = build_outbound_request(parts.method, target, &parts.headers, body)?;

        self.runtime.record_request();

        let slot = match timeout_at(deadline, self.runtime.transport().acquire_slot()).await {
            Ok(Ok(slot)) => slot,
            Ok(Err(e)) => return Err(self.dispatch_failed(e)),
            Err(_) => return Err(self.dispatch_failed(RelayError::UpstreamTimeout)),
        };

        let headers_deadline = deadline.min(Instant::now() + self.response_header_timeout);
        let response =
            match timeout_at(headers_deadline, self.runtime.transport().request(outbound)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(self.dispatch_failed(e.into())),
                Err(_) => return Err(self.dispatch_failed(RelayError::UpstreamTimeout)),
            };

        debug!(status = response.status().as_u16(), "Upstream responded");
        Ok(relay_response(response, deadline, slot, self.debug))
    }

    fn dispatch_failed(&self, err: RelayError) -> RelayError {
        // Detail stays out of the logs unless debugging.
        if self.debug {
            warn!(error = %err, "Proxy request failed");
        }
        err
    }
}

/// Compose the upstream URL: origin, then the inbound path and raw query
/// exactly as received. The proxy prefix is kept.
pub fn build_upstream_uri(origin: &str, inbound: &Uri) -> Result<Uri> {
    let path = inbound.path();
    let query = inbound.query();

    let mut target =
        String::with_capacity(origin.len() + path.len() + query.map_or(0, |q| q.len() + 1));
    target.push_str(origin);
    target.push_str(path);
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }

    target
        .parse::<Uri>()
        .map_err(|e| RelayError::InvalidTarget(e.to_string()))
}

/// Same method and body stream as the inbound request, end-to-end headers only.
pub fn build_outbound_request(
    method: Method,
    target: Uri,
    inbound_headers: &HeaderMap,
    body: Body,
) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(target);
    if let Some(headers) = builder.headers_mut() {
        *headers = outbound_headers(inbound_headers);
    }
    Ok(builder.body(body)?)
}

/// Upstream status and end-to-end headers, body streamed under the deadline.
fn relay_response(
    response: Response<Incoming>,
    deadline: Instant,
    slot: OwnedSemaphorePermit,
    debug: bool,
) -> Response<Body> {
    let (parts, body) = response.into_parts();

    let mut relayed = Response::new(Body::new(RelayBody::new(
        body,
        deadline,
        Some(slot),
        debug,
    )));
    *relayed.status_mut() = parts.status;
    copy_end_to_end(&parts.headers, relayed.headers_mut());
    relayed
}
