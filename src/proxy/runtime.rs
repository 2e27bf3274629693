//! Process-wide relay runtime
//!
//! Owns the shared upstream transport and the served-request counter.
//! Created once in `main` and handed to every request through axum state.

use std::time::Instant;

use parking_lot::RwLock;

use crate::config::UpstreamConfig;
use crate::proxy::transport::UpstreamTransport;

pub struct RelayRuntime {
    transport: UpstreamTransport,
    requests: RwLock<u64>,
    started_at: Instant,
}

impl RelayRuntime {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            transport: UpstreamTransport::new(config),
            requests: RwLock::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn transport(&self) -> &UpstreamTransport {
        &self.transport
    }

    /// Count one proxied request. Returns the new total.
    pub fn record_request(&self) -> u64 {
        let mut requests = self.requests.write();
        *requests += 1;
        *requests
    }

    /// Proxied requests since startup
    pub fn requests_served(&self) -> u64 {
        *self.requests.read()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
