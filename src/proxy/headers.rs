//! Hop-by-hop header filtering
//!
//! Headers that only describe a single connection are dropped in both
//! directions. Everything else, custom authentication headers included,
//! is copied value by value in the order received.

use std::collections::HashSet;
use std::sync::LazyLock;

use hyper::header::{self, HeaderMap, HeaderName};

static HOP_BY_HOP: LazyLock<HashSet<HeaderName>> = LazyLock::new(|| {
    [
        header::CONNECTION,
        HeaderName::from_static("keep-alive"),
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        HeaderName::from_static("trailers"),
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ]
    .into_iter()
    .collect()
});

/// Check if a header is a hop-by-hop header that should not be forwarded
pub fn is_hop_by_hop_header(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Copy every end-to-end header from `source` into `target`, preserving
/// multiplicity and order of values.
pub fn copy_end_to_end(source: &HeaderMap, target: &mut HeaderMap) {
    for (name, value) in source {
        if is_hop_by_hop_header(name) {
            continue;
        }
        target.append(name.clone(), value.clone());
    }
}

/// Headers for the outbound request. `Host` is left to the client, which
/// derives it from the upstream authority.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    copy_end_to_end(inbound, &mut headers);
    headers.remove(header::HOST);
    headers
}
