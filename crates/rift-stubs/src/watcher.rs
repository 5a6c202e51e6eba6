//! Polling watcher that reloads the configuration when its files change.

use crate::config::StubsConfig;
use crate::stubs::StubRepository;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Modification time and length of one watched file.
type Fingerprint = Option<(SystemTime, u64)>;

fn fingerprint(path: &Path) -> Fingerprint {
    let metadata = std::fs::metadata(path).ok()?;
    Some((metadata.modified().ok()?, metadata.len()))
}

/// What a single poll observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Unchanged,
    Reloaded { stubs: usize },
    /// The files changed but did not load; the previous configuration stays.
    Failed(String),
}

pub struct ConfigWatcher {
    main_file: PathBuf,
    repository: Arc<StubRepository>,
    interval: Duration,
    watched: Vec<(PathBuf, Fingerprint)>,
}

impl ConfigWatcher {
    /// Watch `main_file` and the files it included when last loaded.
    pub fn new(
        main_file: PathBuf,
        sources: &[PathBuf],
        repository: Arc<StubRepository>,
        interval: Duration,
    ) -> Self {
        let mut watcher = Self {
            main_file,
            repository,
            interval,
            watched: Vec::new(),
        };
        watcher.track(sources);
        watcher
    }

    fn track(&mut self, sources: &[PathBuf]) {
        let mut paths = vec![self.main_file.clone()];
        for source in sources {
            if !paths.contains(source) {
                paths.push(source.clone());
            }
        }
        self.watched = paths
            .into_iter()
            .map(|path| {
                let print = fingerprint(&path);
                (path, print)
            })
            .collect();
    }

    fn changed(&self) -> bool {
        self.watched
            .iter()
            .any(|(path, print)| fingerprint(path) != *print)
    }

    /// Check the watched files once and reload if any of them changed.
    pub fn poll(&mut self) -> PollOutcome {
        if !self.changed() {
            return PollOutcome::Unchanged;
        }

        match StubsConfig::load_tracked(&self.main_file) {
            Ok(config) => {
                let stubs = config.entries.len();
                let sources = config.sources.clone();
                config.install(&self.repository);
                self.track(&sources);
                info!("Reloaded {} after a change ({} stubs)", self.main_file.display(), stubs);
                PollOutcome::Reloaded { stubs }
            }
            Err((e, attempted)) => {
                // Report a broken file once per change, and keep watching
                // files the broken configuration started to include.
                let mut sources: Vec<PathBuf> =
                    self.watched.iter().map(|(p, _)| p.clone()).collect();
                sources.extend(attempted);
                self.track(&sources);
                warn!(
                    "Reload of {} failed, keeping the previous configuration: {}",
                    self.main_file.display(),
                    e
                );
                PollOutcome::Failed(e.to_string())
            }
        }
    }

    /// Poll forever at the configured interval.
    pub async fn run(mut self) {
        info!(
            "Watching {} for changes every {:?}",
            self.main_file.display(),
            self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _ = self.poll();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::ObservedRequest;
    use crate::stubs::Lookup;

    fn found(repository: &StubRepository, uri: &str) -> bool {
        matches!(
            repository.find_match(&ObservedRequest::new("GET", uri)),
            Lookup::Found(_)
        )
    }

    #[test]
    fn test_poll_reloads_on_change_and_keeps_config_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("stubs.yaml");
        std::fs::write(&main, "- request: {url: ^/one$}\n").unwrap();

        let config = StubsConfig::from_file(&main).unwrap();
        let sources = config.sources.clone();
        let repository = Arc::new(StubRepository::new());
        config.install(&repository);

        let mut watcher = ConfigWatcher::new(
            main.clone(),
            &sources,
            Arc::clone(&repository),
            Duration::from_millis(10),
        );
        assert_eq!(watcher.poll(), PollOutcome::Unchanged);

        std::fs::write(
            &main,
            "- request: {url: ^/one$}\n- request: {url: ^/two$}\n",
        )
        .unwrap();
        assert_eq!(watcher.poll(), PollOutcome::Reloaded { stubs: 2 });
        assert!(found(&repository, "/two"));

        std::fs::write(&main, "- request: {url: '(('}\n").unwrap();
        assert!(matches!(watcher.poll(), PollOutcome::Failed(_)));
        assert!(found(&repository, "/two"));
        assert_eq!(watcher.poll(), PollOutcome::Unchanged);
    }

    #[test]
    fn test_poll_watches_includes_added_by_a_failed_reload() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("stubs.yaml");
        let first = dir.path().join("a.yaml");
        let second = dir.path().join("b.yaml");
        std::fs::write(&first, "- request: {url: ^/a$}\n").unwrap();
        std::fs::write(&main, "includes: [a.yaml]\n").unwrap();

        let config = StubsConfig::from_file(&main).unwrap();
        let sources = config.sources.clone();
        let repository = Arc::new(StubRepository::new());
        config.install(&repository);
        let mut watcher = ConfigWatcher::new(
            main.clone(),
            &sources,
            Arc::clone(&repository),
            Duration::from_millis(10),
        );

        // The new include is broken: the reload fails but b.yaml is watched.
        std::fs::write(&second, "- request: {url: '(('}\n").unwrap();
        std::fs::write(&main, "includes: [a.yaml, b.yaml]\n").unwrap();
        assert!(matches!(watcher.poll(), PollOutcome::Failed(_)));
        assert!(found(&repository, "/a"));
        assert!(!found(&repository, "/b"));

        // Fixing only b.yaml is enough to trigger the next reload.
        std::fs::write(&second, "- request: {url: ^/b$}\n- request: {url: ^/c$}\n").unwrap();
        assert_eq!(watcher.poll(), PollOutcome::Reloaded { stubs: 3 });
        assert!(found(&repository, "/b"));
    }

    #[test]
    fn test_poll_notices_a_missing_include_appearing() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("stubs.yaml");
        std::fs::write(&main, "- request: {url: ^/one$}\n").unwrap();

        let config = StubsConfig::from_file(&main).unwrap();
        let sources = config.sources.clone();
        let repository = Arc::new(StubRepository::new());
        config.install(&repository);
        let mut watcher = ConfigWatcher::new(
            main.clone(),
            &sources,
            Arc::clone(&repository),
            Duration::from_millis(10),
        );

        std::fs::write(&main, "includes: [later.yaml]\n").unwrap();
        assert!(matches!(watcher.poll(), PollOutcome::Failed(_)));
        assert!(found(&repository, "/one"));

        std::fs::write(dir.path().join("later.yaml"), "- request: {url: ^/later$}\n").unwrap();
        assert_eq!(watcher.poll(), PollOutcome::Reloaded { stubs: 1 });
        assert!(found(&repository, "/later"));
    }
}
