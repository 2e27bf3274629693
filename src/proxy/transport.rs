//! Shared upstream transport
//!
//! One pooled HTTPS client for the lifetime of the process. Each phase of
//! acquiring a connection has its own bound: a slot in the per-host
//! connection limit, then TCP connect plus TLS handshake.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use hyper::{Request, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::{Client, ResponseFuture};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower::{BoxError, Service};
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::{RelayError, Result};

/// Client type used for every upstream call
pub type UpstreamClient = Client<TimeoutConnector<HttpsConnector<HttpConnector>>, Body>;

/// Connector wrapper bounding connection establishment (TCP and TLS).
#[derive(Clone, Debug)]
pub struct TimeoutConnector<C> {
    inner: C,
    timeout: Duration,
}

impl<C> TimeoutConnector<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<C> Service<Uri> for TimeoutConnector<C>
where
    C: Service<Uri>,
    C::Response: Send + 'static,
    C::Error: Into<BoxError>,
    C::Future: Send + 'static,
{
    type Response = C::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<C::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), BoxError>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let timeout = self.timeout;
        let connecting = self.inner.call(uri);

        Box::pin(async move {
            match tokio::time::timeout(timeout, connecting).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "upstream connect/handshake timed out",
                )) as BoxError),
            }
        })
    }
}

/// Pooled transport to the upstream origin
pub struct UpstreamTransport {
    client: UpstreamClient,
    slots: Arc<Semaphore>,
    max_conns: usize,
    pool_timeout: Duration,
}

impl UpstreamTransport {
    /// Build the transport. Called once at startup.
    pub fn new(config: &UpstreamConfig) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_keepalive(Some(Duration::from_secs(30)));

        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http);

        let connector = TimeoutConnector::new(https, config.handshake_timeout);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.idle_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build(connector);

        debug!(
            max_idle_per_host = config.max_idle_per_host,
            max_conns_per_host = config.max_conns_per_host,
            "Upstream transport created"
        );

        Self {
            client,
            slots: Arc::new(Semaphore::new(config.max_conns_per_host)),
            max_conns: config.max_conns_per_host,
            pool_timeout: config.pool_timeout,
        }
    }

    /// Wait for a slot in the per-host connection limit.
    ///
    /// The permit is held until the relayed response body is finished.
    pub async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        match tokio::time::timeout(self.pool_timeout, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(RelayError::Internal("connection slots closed".into())),
            Err(_) => Err(RelayError::PoolTimeout),
        }
    }

    /// Issue a request over the pool.
    pub fn request(&self, req: Request<Body>) -> ResponseFuture {
        self.client.request(req)
    }

    /// Upstream requests currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_conns - self.slots.available_permits()
    }
}
