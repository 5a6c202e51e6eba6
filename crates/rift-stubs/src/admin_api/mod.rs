//! Admin REST API for the stub repository.
//!
//! This module provides:
//! - Dumping, replacing, updating and deleting stubs by index or uuid
//! - Proxy config management (`/proxy-config`)
//! - Health and status endpoints
//!
//! Stub documents are exchanged as YAML in the loader's format; errors are
//! reported as JSON.

mod handlers;
mod router;
mod server;
mod types;

pub use server::{AdminApiServer, AdminState};
