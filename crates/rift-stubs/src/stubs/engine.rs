//! First-match-wins lookup over an ordered stub list.

use super::entry::StubEntry;
use super::types::{ProxyConfig, DEFAULT_PROXY_CONFIG, PROXY_CONFIG_HEADER};
use crate::capture::CaptureStore;
use crate::predicate::ObservedRequest;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of running a request through the stub list.
#[derive(Debug)]
pub enum MatchOutcome {
    Matched {
        entry: Arc<StubEntry>,
        rank: usize,
        captures: CaptureStore,
    },
    Proxy(ProxyConfig),
    NoMatch,
}

/// Find the first entry matching `request`. When none matches, fall back to
/// the proxy config named by the request (or the default one).
pub fn find_first(
    entries: &[Arc<StubEntry>],
    proxy_configs: &BTreeMap<String, ProxyConfig>,
    request: &ObservedRequest,
) -> MatchOutcome {
    for (rank, entry) in entries.iter().enumerate() {
        let mut captures = CaptureStore::new();
        if entry.matches(request, &mut captures) {
            debug!(
                "Stub {} matched {} {} ({} captures)",
                rank,
                request.method,
                request.path,
                captures.len()
            );
            return MatchOutcome::Matched {
                entry: Arc::clone(entry),
                rank,
                captures,
            };
        }
    }

    let selected = request
        .header(PROXY_CONFIG_HEADER)
        .map(str::trim)
        .filter(|uuid| !uuid.is_empty());
    let config = match selected {
        Some(uuid) => proxy_configs.get(uuid).or_else(|| {
            warn!(
                "Proxy config '{}' requested by {} not found, using '{}'",
                uuid, PROXY_CONFIG_HEADER, DEFAULT_PROXY_CONFIG
            );
            proxy_configs.get(DEFAULT_PROXY_CONFIG)
        }),
        None => proxy_configs.get(DEFAULT_PROXY_CONFIG),
    };
    match config {
        Some(config) => MatchOutcome::Proxy(config.clone()),
        None => MatchOutcome::NoMatch,
    }
}
