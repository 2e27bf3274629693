//! api-relay - Entry Point
//!
//! Loads configuration, builds the shared relay runtime once, and serves
//! until Ctrl+C or SIGTERM.

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_relay::api::handlers::health::cpu_cores;
use api_relay::api::{AppState, RelayServer};
use api_relay::config::{Config, LogConfig};
use api_relay::error;

#[tokio::main]
async fn main() -> error::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    init_tracing(&config.log);
    info!("Starting api-relay");

    let listen_addr = config.listen_addr();
    info!("Proxying {} to {}", config.upstream.proxy_prefix, config.upstream.origin);
    info!(
        "Max connections per host: {} (idle: {})",
        config.upstream.max_conns_per_host, config.upstream.max_idle_per_host
    );
    info!("Using {} CPU cores", cpu_cores());

    // Shared transport and counter live here for the whole process.
    let state = AppState::new(config);
    let server = RelayServer::new(state);

    let listener = server.bind(&listen_addr).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(listener, shutdown_rx).await {
            error!("Relay server error: {}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = server_task.await;

    info!("api-relay stopped");
    Ok(())
}

/// Initialize tracing. `RUST_LOG` takes precedence over `LOG_LEVEL`.
fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("api_relay={level},tower_http={level}", level = log.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
