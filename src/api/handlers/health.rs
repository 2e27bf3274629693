//! Health, metrics and service descriptor endpoints

use axum::extract::State;
use axum::Json;
use sysinfo::System;

use crate::api::server::AppState;
use crate::models::{rfc3339_now, HealthStatus, MetricsSnapshot, ServiceDescriptor};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        timestamp: rfc3339_now(),
        requests_served: state.runtime.requests_served(),
        active_tasks: active_tasks(),
    })
}

/// Runtime metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    let (rss, virtual_memory) = process_memory();

    Json(MetricsSnapshot {
        requests_total: state.runtime.requests_served(),
        active_tasks: active_tasks(),
        upstream_in_flight: state.runtime.transport().in_flight(),
        memory_rss_mb: rss as f64 / BYTES_PER_MB,
        memory_virtual_mb: virtual_memory as f64 / BYTES_PER_MB,
        cpu_cores: cpu_cores(),
        uptime_seconds: state.runtime.uptime_secs(),
    })
}

/// Root capability descriptor
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor {
        message: "API CORS Relay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "/health".to_string(),
            "/metrics".to_string(),
            format!("{}*", state.config.upstream.proxy_prefix),
        ],
        timestamp: rfc3339_now(),
    })
}

fn active_tasks() -> usize {
    tokio::runtime::Handle::current()
        .metrics()
        .num_alive_tasks()
}

pub fn cpu_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resident and virtual memory of this process, in bytes
fn process_memory() -> (u64, u64) {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return (0, 0);
    };

    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return (0, 0);
    }

    sys.process(pid)
        .map(|p| (p.memory(), p.virtual_memory()))
        .unwrap_or((0, 0))
}
