//! Ingress middleware

mod cors;
mod logging;

pub use cors::{apply_cors_headers, cors, ALLOWED_HEADERS, ALLOWED_METHODS, MAX_AGE};
pub use logging::RequestLogging;
