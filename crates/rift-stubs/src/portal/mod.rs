//! The stubs portal: the HTTP listener that serves stubbed responses.
//!
//! For every request the portal asks the repository for a match and then:
//! - replays the rendered response (after its latency, if any), tagged with
//!   `x-stubby-resource-id: <rank>`, first recording its body from upstream
//!   when the body is a URL that has not been recorded yet
//! - answers `401` when the matched stub's credentials are missing or wrong
//! - forwards to the selected proxy config's endpoint, `500` on failure
//! - answers `404 No stub matched <METHOD> <path>` otherwise

mod handler;
mod server;

pub use handler::{handle_request, into_response, observe};
pub use server::PortalServer;
