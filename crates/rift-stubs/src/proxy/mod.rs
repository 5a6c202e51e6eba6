//! Upstream proxy fallback.
//!
//! Requests that match no stub are forwarded to the endpoint of the selected
//! proxy config: the one named by the `x-stubby-proxy-config` request header,
//! or `default`.
//!
//! - `as-is` - forward the request untouched
//! - `additive` - also send the config's `headers`
//!
//! Each forwarded request carries a fresh round-trip id in
//! `x-stubby-proxy-request`, echoed back to the client in
//! `x-stubby-proxy-response`.
//!
//! A stub response whose body is an `http://` or `https://` URL is recorded:
//! the first request it serves is repeated against that URL and the upstream
//! body is replayed from then on.

mod forwarding;

pub use forwarding::{forward, outbound_headers, record, target_url};
