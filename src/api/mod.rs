//! Ingress handler
//!
//! Applies the cross-origin policy, serves the operational endpoints and
//! hands everything under the proxy prefix to the forwarder.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{AppState, RelayServer};
