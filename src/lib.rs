//! api-relay - CORS Forwarding Relay
//!
//! Lets browser clients call a single upstream API that does not send
//! cross-origin headers itself.
//!
//! ## Features
//!
//! - Path and query forwarded byte-for-byte to a fixed upstream origin
//! - Hop-by-hop header stripping in both directions
//! - Pooled HTTPS transport with bounded connect, header and request deadlines
//! - Streaming request and response bodies
//! - Wildcard CORS policy with preflight short-circuit
//! - Health and runtime metrics endpoints

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{RelayError, Result};
