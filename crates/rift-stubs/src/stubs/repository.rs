//! Concurrency-safe stub and proxy config store.
//!
//! Readers clone the current [`Snapshot`] handle under a short read lock and
//! match against it without holding any lock. Writers are serialized by a
//! mutex, build the next snapshot from the current one and swap it in.
//! Entries that a mutation does not touch are carried over as the same
//! `Arc<StubEntry>`, so their cursors and hit counts survive.

use super::engine::{find_first, MatchOutcome};
use super::entry::StubEntry;
use super::response::Recording;
use super::types::{
    Declaration, ProxyConfig, RenderedResponse, ResourceStat, StubError, DEFAULT_PROXY_CONFIG,
};
use crate::auth::{AuthOutcome, AUTHORIZATION_HEADER};
use crate::predicate::ObservedRequest;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Immutable view of the repository at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<Arc<StubEntry>>,
    proxy_configs: BTreeMap<String, ProxyConfig>,
}

impl Snapshot {
    pub fn entries(&self) -> &[Arc<StubEntry>] {
        &self.entries
    }

    pub fn proxy_configs(&self) -> &BTreeMap<String, ProxyConfig> {
        &self.proxy_configs
    }

    fn position_of(&self, uuid: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.uuid() == Some(uuid))
    }
}

/// A matched stub and the response rendered for it.
#[derive(Debug, Clone)]
pub struct StubHit {
    pub rank: usize,
    pub uuid: Option<String>,
    pub response: RenderedResponse,
    /// Set when the body still has to be recorded from upstream.
    pub recording: Option<Recording>,
}

/// Outcome of looking up a request.
#[derive(Debug)]
pub enum Lookup {
    Found(StubHit),
    /// A stub matched but the request's credentials did not.
    Unauthorized { rank: usize, outcome: AuthOutcome },
    Proxy(ProxyConfig),
    NotFound(StubError),
}

/// Target of a positional or uuid-based operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubSelector {
    Index(usize),
    Uuid(String),
}

impl StubSelector {
    /// A path segment that parses as a number selects by index.
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<usize>() {
            Ok(index) => StubSelector::Index(index),
            Err(_) => StubSelector::Uuid(segment.to_string()),
        }
    }
}

/// Ordered stubs plus proxy configs, shared by the portal and the admin API.
#[derive(Debug, Default)]
pub struct StubRepository {
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl StubRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository holding `entries` and `proxy_configs`.
    pub fn with_contents(entries: Vec<StubEntry>, proxy_configs: Vec<ProxyConfig>) -> Self {
        let repository = Self::new();
        repository.replace_all(entries, proxy_configs);
        repository
    }

    /// Current snapshot handle.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Snapshot) -> Result<T, StubError>,
    ) -> Result<T, StubError> {
        let _guard = self.writer.lock();
        let mut next = Snapshot::clone(&self.snapshot.read());
        let result = change(&mut next)?;
        *self.snapshot.write() = Arc::new(next);
        Ok(result)
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Match, authorize, select and render the response for `request`.
    pub fn find_match(&self, request: &ObservedRequest) -> Lookup {
        let snapshot = self.snapshot();
        match find_first(&snapshot.entries, &snapshot.proxy_configs, request) {
            MatchOutcome::Matched {
                entry,
                rank,
                captures,
            } => {
                entry.record_hit();
                if let Some(auth) = entry.request().authorization() {
                    let outcome = auth.check(request.header(AUTHORIZATION_HEADER));
                    if outcome != AuthOutcome::Granted {
                        debug!("Stub {} matched but authorization was {:?}", rank, outcome);
                        return Lookup::Unauthorized { rank, outcome };
                    }
                }
                let next = entry.next_response();
                Lookup::Found(StubHit {
                    rank,
                    uuid: entry.uuid().map(str::to_string),
                    response: next.render(&captures),
                    recording: next.pending_recording().cloned(),
                })
            }
            MatchOutcome::Proxy(config) => Lookup::Proxy(config),
            MatchOutcome::NoMatch => Lookup::NotFound(StubError::NoMatch {
                method: request.method.clone(),
                path: request.path_and_query(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Stubs
    // ------------------------------------------------------------------------

    /// Atomically swap in a new set of stubs and proxy configs.
    pub fn replace_all(&self, entries: Vec<StubEntry>, proxy_configs: Vec<ProxyConfig>) {
        let next = Snapshot {
            entries: entries.into_iter().map(Arc::new).collect(),
            proxy_configs: proxy_configs
                .into_iter()
                .map(|config| (config.uuid.clone(), config))
                .collect(),
        };
        let _guard = self.writer.lock();
        info!(
            "Loaded {} stubs and {} proxy configs",
            next.entries.len(),
            next.proxy_configs.len()
        );
        *self.snapshot.write() = Arc::new(next);
    }

    /// Replace the stub with the same uuid in place, or append. Returns the
    /// entry's rank.
    pub fn create_or_append(&self, entry: StubEntry) -> Result<usize, StubError> {
        self.mutate(|snapshot| {
            let existing = entry.uuid().and_then(|uuid| snapshot.position_of(uuid));
            let rank = match existing {
                Some(rank) => {
                    snapshot.entries[rank] = Arc::new(entry);
                    rank
                }
                None => {
                    snapshot.entries.push(Arc::new(entry));
                    snapshot.entries.len() - 1
                }
            };
            info!("Stored stub at index {}", rank);
            Ok(rank)
        })
    }

    fn resolve(snapshot: &Snapshot, selector: &StubSelector) -> Result<usize, StubError> {
        match selector {
            StubSelector::Index(index) if *index < snapshot.entries.len() => Ok(*index),
            StubSelector::Index(index) => Err(StubError::IndexOutOfRange(*index)),
            StubSelector::Uuid(uuid) => snapshot
                .position_of(uuid)
                .ok_or_else(|| StubError::UuidNotFound(uuid.clone())),
        }
    }

    /// Replace the selected stub. The new entry starts with a fresh cursor.
    pub fn update(&self, selector: &StubSelector, entry: StubEntry) -> Result<usize, StubError> {
        self.mutate(|snapshot| {
            let rank = Self::resolve(snapshot, selector)?;
            if let Some(uuid) = entry.uuid() {
                if snapshot.position_of(uuid).is_some_and(|other| other != rank) {
                    return Err(StubError::InvalidConfiguration(format!(
                        "uuid '{uuid}' is already used by another stub"
                    )));
                }
            }
            snapshot.entries[rank] = Arc::new(entry);
            info!("Updated stub at index {}", rank);
            Ok(rank)
        })
    }

    pub fn update_by_index(&self, index: usize, entry: StubEntry) -> Result<usize, StubError> {
        self.update(&StubSelector::Index(index), entry)
    }

    pub fn update_by_uuid(&self, uuid: &str, entry: StubEntry) -> Result<usize, StubError> {
        self.update(&StubSelector::Uuid(uuid.to_string()), entry)
    }

    /// Remove the selected stub; later stubs move up one rank.
    pub fn delete(&self, selector: &StubSelector) -> Result<Arc<StubEntry>, StubError> {
        self.mutate(|snapshot| {
            let rank = Self::resolve(snapshot, selector)?;
            info!("Deleted stub at index {}", rank);
            Ok(snapshot.entries.remove(rank))
        })
    }

    pub fn delete_by_index(&self, index: usize) -> Result<Arc<StubEntry>, StubError> {
        self.delete(&StubSelector::Index(index))
    }

    pub fn delete_by_uuid(&self, uuid: &str) -> Result<Arc<StubEntry>, StubError> {
        self.delete(&StubSelector::Uuid(uuid.to_string()))
    }

    /// Remove every stub and every proxy config.
    pub fn clear(&self) {
        let _guard = self.writer.lock();
        *self.snapshot.write() = Arc::new(Snapshot::default());
        info!("Deleted all stubs and proxy configs");
    }

    pub fn get(&self, selector: &StubSelector) -> Result<Arc<StubEntry>, StubError> {
        let snapshot = self.snapshot();
        let rank = Self::resolve(&snapshot, selector)?;
        Ok(Arc::clone(&snapshot.entries[rank]))
    }

    pub fn len(&self) -> usize {
        self.snapshot().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------------
    // Dumps
    // ------------------------------------------------------------------------

    /// Whole configuration as YAML, proxy configs first.
    pub fn dump_all(&self) -> Result<String, StubError> {
        let snapshot = self.snapshot();
        let declarations: Vec<Declaration> = ordered_proxy_configs(&snapshot)
            .into_iter()
            .map(|config| Declaration::Proxy {
                proxy_config: config.clone(),
            })
            .chain(
                snapshot
                    .entries
                    .iter()
                    .map(|e| Declaration::Stub(e.to_declaration())),
            )
            .collect();
        to_yaml(&declarations)
    }

    pub fn dump(&self, selector: &StubSelector) -> Result<String, StubError> {
        let entry = self.get(selector)?;
        to_yaml(&[Declaration::Stub(entry.to_declaration())])
    }

    pub fn dump_by_index(&self, index: usize) -> Result<String, StubError> {
        self.dump(&StubSelector::Index(index))
    }

    pub fn dump_by_uuid(&self, uuid: &str) -> Result<String, StubError> {
        self.dump(&StubSelector::Uuid(uuid.to_string()))
    }

    /// Hit counts of every stub, in rank order.
    pub fn resource_stats(&self) -> Vec<ResourceStat> {
        self.snapshot()
            .entries
            .iter()
            .enumerate()
            .map(|(rank, entry)| ResourceStat {
                rank,
                uuid: entry.uuid().map(str::to_string),
                url: entry.request().url().map(str::to_string),
                hits: entry.hits(),
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Proxy configs
    // ------------------------------------------------------------------------

    /// All proxy configs, `default` first.
    pub fn proxy_configs(&self) -> Vec<ProxyConfig> {
        ordered_proxy_configs(&self.snapshot())
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn proxy_config(&self, uuid: &str) -> Result<ProxyConfig, StubError> {
        self.snapshot()
            .proxy_configs
            .get(uuid)
            .cloned()
            .ok_or_else(|| StubError::ProxyConfigNotFound(uuid.to_string()))
    }

    /// Insert or replace a proxy config. An existing `default` cannot be
    /// replaced.
    pub fn upsert_proxy_config(&self, config: ProxyConfig) -> Result<(), StubError> {
        config.validate()?;
        self.mutate(|snapshot| {
            if config.is_default() && snapshot.proxy_configs.contains_key(DEFAULT_PROXY_CONFIG) {
                return Err(StubError::DefaultProxyConfigImmutable);
            }
            info!("Stored proxy config '{}'", config.uuid);
            snapshot.proxy_configs.insert(config.uuid.clone(), config);
            Ok(())
        })
    }

    /// Replace an existing proxy config. The config keeps the uuid it is
    /// stored under.
    pub fn update_proxy_config(&self, uuid: &str, mut config: ProxyConfig) -> Result<(), StubError> {
        if uuid == DEFAULT_PROXY_CONFIG {
            return Err(StubError::DefaultProxyConfigImmutable);
        }
        config.uuid = uuid.to_string();
        config.validate()?;
        self.mutate(|snapshot| {
            let slot = snapshot
                .proxy_configs
                .get_mut(uuid)
                .ok_or_else(|| StubError::ProxyConfigNotFound(uuid.to_string()))?;
            *slot = config;
            info!("Updated proxy config '{}'", uuid);
            Ok(())
        })
    }

    pub fn delete_proxy_config(&self, uuid: &str) -> Result<ProxyConfig, StubError> {
        if uuid == DEFAULT_PROXY_CONFIG {
            return Err(StubError::DefaultProxyConfigImmutable);
        }
        self.mutate(|snapshot| {
            let removed = snapshot
                .proxy_configs
                .remove(uuid)
                .ok_or_else(|| StubError::ProxyConfigNotFound(uuid.to_string()))?;
            info!("Deleted proxy config '{}'", uuid);
            Ok(removed)
        })
    }

    pub fn dump_proxy_configs(&self) -> Result<String, StubError> {
        let declarations: Vec<Declaration> = self
            .proxy_configs()
            .into_iter()
            .map(|proxy_config| Declaration::Proxy { proxy_config })
            .collect();
        to_yaml(&declarations)
    }

    pub fn dump_proxy_config(&self, uuid: &str) -> Result<String, StubError> {
        let proxy_config = self.proxy_config(uuid)?;
        to_yaml(&[Declaration::Proxy { proxy_config }])
    }
}

fn ordered_proxy_configs(snapshot: &Snapshot) -> Vec<&ProxyConfig> {
    let mut configs: Vec<&ProxyConfig> = snapshot.proxy_configs.values().collect();
    configs.sort_by_key(|config| !config.is_default());
    configs
}

fn to_yaml(declarations: &[Declaration]) -> Result<String, StubError> {
    serde_yaml::to_string(declarations)
        .map_err(|e| StubError::InvalidConfiguration(format!("cannot serialize stubs: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::RequestPattern;
    use crate::stubs::types::{ResponsePattern, StubDeclaration};
    use bytes::Bytes;
    use std::path::Path;

    fn entry(url: &str, body: &str) -> StubEntry {
        StubEntry::compile(
            StubDeclaration::new(RequestPattern::new().with_url(url))
                .with_response(ResponsePattern::new().with_body(body)),
            Path::new("."),
        )
        .unwrap()
    }

    fn entry_with_uuid(url: &str, body: &str, uuid: &str) -> StubEntry {
        StubEntry::compile(
            StubDeclaration::new(RequestPattern::new().with_url(url))
                .with_uuid(uuid)
                .with_response(ResponsePattern::new().with_body(body)),
            Path::new("."),
        )
        .unwrap()
    }

    fn body_for(repository: &StubRepository, uri: &str) -> Option<Bytes> {
        match repository.find_match(&ObservedRequest::new("GET", uri)) {
            Lookup::Found(hit) => Some(hit.response.body),
            _ => None,
        }
    }

    #[test]
    fn test_capture_round_trip() {
        let repository = StubRepository::with_contents(
            vec![StubEntry::compile(
                StubDeclaration::new(RequestPattern::new().with_url("^/item/([0-9]+)$"))
                    .with_response(ResponsePattern::new().with_body("<% url.0.1 %>")),
                Path::new("."),
            )
            .unwrap()],
            vec![],
        );
        assert_eq!(body_for(&repository, "/item/42"), Some(Bytes::from("42")));
    }

    #[test]
    fn test_positional_delete_shifts_ranks() {
        let repository = StubRepository::with_contents(
            vec![entry("^/a$", "a"), entry("^/b$", "b"), entry("^/c$", "c")],
            vec![],
        );

        repository.delete_by_index(1).unwrap();
        assert_eq!(repository.len(), 2);
        let c = repository.get(&StubSelector::Index(1)).unwrap();
        assert_eq!(c.request().url(), Some("^/c$"));
        assert!(matches!(
            repository.delete_by_index(2),
            Err(StubError::IndexOutOfRange(2))
        ));
    }

    #[test]
    fn test_update_by_uuid_and_missing_targets() {
        let repository = StubRepository::with_contents(
            vec![entry_with_uuid("^/a$", "a", "first"), entry("^/b$", "b")],
            vec![],
        );

        let rank = repository
            .update_by_uuid("first", entry_with_uuid("^/a$", "A2", "first"))
            .unwrap();
        assert_eq!(rank, 0);
        assert_eq!(body_for(&repository, "/a"), Some(Bytes::from("A2")));

        assert!(matches!(
            repository.update_by_uuid("missing", entry("^/x$", "x")),
            Err(StubError::UuidNotFound(_))
        ));
        assert!(matches!(
            repository.update_by_index(5, entry("^/x$", "x")),
            Err(StubError::IndexOutOfRange(5))
        ));
        assert_eq!(repository.len(), 2);
    }

    #[test]
    fn test_update_rejects_uuid_taken_by_other_stub() {
        let repository = StubRepository::with_contents(
            vec![entry_with_uuid("^/a$", "a", "one"), entry_with_uuid("^/b$", "b", "two")],
            vec![],
        );
        assert!(matches!(
            repository.update_by_index(1, entry_with_uuid("^/b$", "b", "one")),
            Err(StubError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_create_or_append() {
        let repository = StubRepository::new();
        assert_eq!(
            repository
                .create_or_append(entry_with_uuid("^/a$", "a", "u1"))
                .unwrap(),
            0
        );
        assert_eq!(repository.create_or_append(entry("^/b$", "b")).unwrap(), 1);
        assert_eq!(
            repository
                .create_or_append(entry_with_uuid("^/a$", "a2", "u1"))
                .unwrap(),
            0
        );
        assert_eq!(repository.len(), 2);
        assert_eq!(body_for(&repository, "/a"), Some(Bytes::from("a2")));
    }

    #[test]
    fn test_update_resets_cursor_but_untouched_entries_keep_theirs() {
        let sequence = |url: &str| {
            StubEntry::compile(
                StubDeclaration::new(RequestPattern::new().with_url(url))
                    .with_response(ResponsePattern::new().with_body("1"))
                    .with_response(ResponsePattern::new().with_body("2")),
                Path::new("."),
            )
            .unwrap()
        };
        let repository = StubRepository::with_contents(vec![sequence("^/a$"), sequence("^/b$")], vec![]);

        assert_eq!(body_for(&repository, "/a"), Some(Bytes::from("1")));
        assert_eq!(body_for(&repository, "/b"), Some(Bytes::from("1")));

        repository.update_by_index(0, sequence("^/a$")).unwrap();
        assert_eq!(body_for(&repository, "/a"), Some(Bytes::from("1")));
        assert_eq!(body_for(&repository, "/b"), Some(Bytes::from("2")));
    }

    #[test]
    fn test_clear_removes_stubs_and_proxy_configs() {
        let repository = StubRepository::with_contents(
            vec![entry("^/a$", "a")],
            vec![
                ProxyConfig::new("default", "http://localhost:1"),
                ProxyConfig::new("other", "http://localhost:2"),
            ],
        );
        repository.clear();
        assert!(repository.is_empty());
        assert!(repository.proxy_configs().is_empty());
        assert!(matches!(
            repository.find_match(&ObservedRequest::new("GET", "/a")),
            Lookup::NotFound(_)
        ));
    }

    #[test]
    fn test_not_found_names_request() {
        let repository = StubRepository::new();
        match repository.find_match(&ObservedRequest::new("get", "/missing?x=1")) {
            Lookup::NotFound(err) => assert_eq!(err.to_string(), "No stub matched GET /missing?x=1"),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn test_authorization_checked_after_match() {
        let secured = StubEntry::compile(
            StubDeclaration::new(
                RequestPattern::new()
                    .with_url("^/secure$")
                    .with_header("authorization-bearer", "t0k3n"),
            )
            .with_response(ResponsePattern::new().with_body("ok")),
            Path::new("."),
        )
        .unwrap();
        let repository = StubRepository::with_contents(vec![secured, entry("^/secure$", "open")], vec![]);

        assert!(matches!(
            repository.find_match(&ObservedRequest::new("GET", "/secure")),
            Lookup::Unauthorized {
                rank: 0,
                outcome: AuthOutcome::Missing
            }
        ));
        assert!(matches!(
            repository.find_match(
                &ObservedRequest::new("GET", "/secure").with_header("Authorization", "Bearer nope")
            ),
            Lookup::Unauthorized {
                outcome: AuthOutcome::Mismatch,
                ..
            }
        ));
        match repository.find_match(
            &ObservedRequest::new("GET", "/secure").with_header("Authorization", "Bearer t0k3n"),
        ) {
            Lookup::Found(hit) => assert_eq!(hit.response.body, Bytes::from("ok")),
            other => panic!("expected found, got {other:?}"),
        }
    }

    #[test]
    fn test_proxy_config_crud() {
        let repository = StubRepository::with_contents(
            vec![],
            vec![ProxyConfig::new("default", "http://localhost:1")],
        );

        repository
            .upsert_proxy_config(ProxyConfig::new("alt", "http://localhost:2"))
            .unwrap();
        assert_eq!(repository.proxy_configs()[0].uuid, "default");
        assert_eq!(repository.proxy_configs().len(), 2);

        repository
            .update_proxy_config("alt", ProxyConfig::new("ignored", "http://localhost:3"))
            .unwrap();
        assert_eq!(
            repository.proxy_config("alt").unwrap().endpoint(),
            Some("http://localhost:3")
        );

        assert!(matches!(
            repository.update_proxy_config("default", ProxyConfig::new("default", "http://x")),
            Err(StubError::DefaultProxyConfigImmutable)
        ));
        assert!(matches!(
            repository.delete_proxy_config("default"),
            Err(StubError::DefaultProxyConfigImmutable)
        ));
        assert!(matches!(
            repository.upsert_proxy_config(ProxyConfig::new("default", "http://x")),
            Err(StubError::DefaultProxyConfigImmutable)
        ));
        assert!(matches!(
            repository.update_proxy_config("nope", ProxyConfig::new("nope", "http://x")),
            Err(StubError::ProxyConfigNotFound(_))
        ));

        repository.delete_proxy_config("alt").unwrap();
        assert!(matches!(
            repository.proxy_config("alt"),
            Err(StubError::ProxyConfigNotFound(_))
        ));
    }

    #[test]
    fn test_dump_all_lists_proxy_configs_first() {
        let repository = StubRepository::with_contents(
            vec![entry_with_uuid("^/a$", "a", "stub-a")],
            vec![
                ProxyConfig::new("zeta", "http://localhost:2"),
                ProxyConfig::new("default", "http://localhost:1"),
            ],
        );
        let yaml = repository.dump_all().unwrap();

        let default_at = yaml.find("uuid: default").unwrap();
        let zeta_at = yaml.find("uuid: zeta").unwrap();
        let stub_at = yaml.find("uuid: stub-a").unwrap();
        assert!(default_at < zeta_at && zeta_at < stub_at);

        let one = repository.dump_by_uuid("stub-a").unwrap();
        assert!(one.contains("body: a"));
        assert!(matches!(
            repository.dump_by_index(3),
            Err(StubError::IndexOutOfRange(3))
        ));
    }

    #[test]
    fn test_resource_stats_count_hits() {
        let repository =
            StubRepository::with_contents(vec![entry("^/a$", "a"), entry("^/b$", "b")], vec![]);
        body_for(&repository, "/b");
        body_for(&repository, "/b");

        let stats = repository.resource_stats();
        assert_eq!(stats[0].hits, 0);
        assert_eq!(stats[1].hits, 2);
        assert_eq!(stats[1].url.as_deref(), Some("^/b$"));
    }

    #[test]
    fn test_concurrent_lookups_cycle_each_response_once() {
        const THREADS: usize = 12;
        let mut declaration = StubDeclaration::new(RequestPattern::new().with_url("^/seq$"));
        for i in 0..THREADS {
            declaration = declaration.with_response(ResponsePattern::new().with_body(i.to_string()));
        }
        let repository = Arc::new(StubRepository::with_contents(
            vec![StubEntry::compile(declaration, Path::new(".")).unwrap()],
            vec![],
        ));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let repository = Arc::clone(&repository);
                std::thread::spawn(move || body_for(&repository, "/seq").unwrap())
            })
            .collect();

        let mut seen: Vec<usize> = handles
            .into_iter()
            .map(|h| {
                let body = h.join().unwrap();
                std::str::from_utf8(&body).unwrap().parse().unwrap()
            })
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..THREADS).collect::<Vec<_>>());
    }
}
