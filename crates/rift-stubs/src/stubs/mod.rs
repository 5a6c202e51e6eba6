//! The stub engine.
//!
//! - `types` - declarations, proxy configs, errors and rendered output
//! - `cycler` - atomic cursor over a response sequence
//! - `response` - compiled responses and token rendering
//! - `entry` - a compiled stub with its cursor and hit counter
//! - `engine` - first-match-wins lookup
//! - `repository` - the concurrency-safe store served by the portal and admin API

mod cycler;
mod engine;
mod entry;
mod repository;
mod response;
mod types;

pub use cycler::SequenceCursor;
pub use engine::{find_first, MatchOutcome};
pub use entry::StubEntry;
pub use repository::{Lookup, Snapshot, StubHit, StubRepository, StubSelector};
pub use response::{Recording, StubResponse};
pub use types::{
    Declaration, ProxyConfig, ProxyStrategy, RenderedResponse, ResourceStat, ResponsePattern,
    ResponsePolicy, StubDeclaration, StubError, DEFAULT_PROXY_CONFIG, PROXY_CONFIG_HEADER,
    PROXY_REQUEST_HEADER, PROXY_RESPONSE_HEADER, RESOURCE_ID_HEADER,
};
