// Library exports for the binary, benchmarks and integration tests

// ===== Matching core =====
pub mod auth;
pub mod capture;
pub mod predicate;
pub mod stubs;
pub mod template;

// ===== Configuration =====
pub mod config;
pub mod watcher;

// ===== Servers =====
pub mod admin_api;
pub mod portal;
pub mod proxy;

// Re-export the types most callers need at top level
pub use capture::CaptureStore;
pub use config::StubsConfig;
pub use predicate::{ObservedRequest, RequestPattern};
pub use stubs::{Lookup, StubEntry, StubError, StubRepository};
