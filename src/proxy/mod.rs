//! Forwarding core
//!
//! This module provides the upstream side of the relay:
//! - URL reconstruction and outbound request construction
//! - Hop-by-hop header filtering in both directions
//! - The shared, pooled upstream transport
//! - Deadline-bounded streaming of response bodies

pub mod body;
pub mod forwarder;
pub mod headers;
pub mod runtime;
pub mod transport;

pub use forwarder::Forwarder;
pub use runtime::RelayRuntime;
pub use transport::UpstreamTransport;
