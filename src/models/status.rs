use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// RFC 3339, UTC, whole seconds
    pub timestamp: String,
    /// Proxied requests since startup
    pub requests_served: u64,
    /// Tasks alive on the async runtime
    pub active_tasks: usize,
}

/// Runtime metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub active_tasks: usize,
    /// Upstream requests currently holding a connection slot
    pub upstream_in_flight: usize,
    pub memory_rss_mb: f64,
    pub memory_virtual_mb: f64,
    pub cpu_cores: usize,
    pub uptime_seconds: u64,
}

/// Capability descriptor served at the root path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<String>,
    pub timestamp: String,
}

/// Current time formatted as RFC 3339 in UTC
pub fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
