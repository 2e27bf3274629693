//! Ingress server
//!
//! Accepts client connections and serves the ingress router on each one,
//! one task per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::config::{Config, ServerConfig};
use crate::error::{RelayError, Result};
use crate::proxy::{Forwarder, RelayRuntime};

use super::routes;

/// Shared state for ingress handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub runtime: Arc<RelayRuntime>,
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    /// Build the runtime (shared transport and counter) and the forwarder.
    pub fn new(config: Config) -> Self {
        let runtime = Arc::new(RelayRuntime::new(&config.upstream));
        let forwarder = Arc::new(Forwarder::new(
            runtime.clone(),
            &config.upstream,
            config.log.debug,
        ));

        Self {
            config: Arc::new(config),
            runtime,
            forwarder,
        }
    }
}

/// Ingress server
pub struct RelayServer {
    config: ServerConfig,
    router: Router,
}

impl RelayServer {
    /// Create a new server
    pub fn new(state: AppState) -> Self {
        let config = state.config.server.clone();
        let router = routes::create_router(state);

        Self { config, router }
    }

    /// Bind the listen address. Failing here aborts startup.
    pub async fn bind(&self, addr: &str) -> Result<TcpListener> {
        let listener = TcpListener::bind(addr).await?;
        info!("Relay listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Serve connections until shutdown is signalled
    #[instrument(skip(self, listener, shutdown))]
    pub async fn run(&self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, client_addr)) => {
                            let router = self.router.clone();
                            let config = self.config.clone();

                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(
                                    stream,
                                    client_addr,
                                    router,
                                    config,
                                ).await {
                                    debug!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender can never signal again.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Relay server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle a single connection
    async fn handle_connection(
        stream: TcpStream,
        client_addr: SocketAddr,
        router: Router,
        config: ServerConfig,
    ) -> Result<()> {
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let service = TowerToHyperService::new(router);

        http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(config.header_read_timeout)
            .max_buf_size(config.max_header_bytes)
            .serve_connection(io, service)
            .await
            .map_err(|e| RelayError::Internal(format!("{}: {}", client_addr, e)))?;

        Ok(())
    }
}
