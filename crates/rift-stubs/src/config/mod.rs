//! YAML stub configuration loader.
//!
//! A configuration file is either a sequence of declarations or a mapping
//! listing other files to include:
//!
//! ```yaml
//! includes:
//!   - services/users.yaml
//!   - services/orders.yaml
//! ```
//!
//! Each declaration is a stub (`request` plus optional `response`) or a
//! `proxy-config`. Relative paths (includes, request and response files)
//! resolve against the directory of the file that names them.

pub mod scalar;

use crate::stubs::{
    Declaration, ProxyConfig, StubDeclaration, StubEntry, StubError, StubRepository,
    DEFAULT_PROXY_CONFIG,
};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const INCLUDES_KEY: &str = "includes";
const PROXY_CONFIG_KEY: &str = "proxy-config";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IncludesDocument {
    includes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProxyDeclaration {
    #[serde(rename = "proxy-config")]
    proxy_config: ProxyConfig,
}

/// A fully loaded and compiled configuration, ready to be installed.
#[derive(Debug, Default)]
pub struct StubsConfig {
    pub entries: Vec<StubEntry>,
    pub proxy_configs: Vec<ProxyConfig>,
    /// Every file read while loading, the main file first.
    pub sources: Vec<PathBuf>,
}

impl StubsConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StubError> {
        Self::load_tracked(path.as_ref()).map_err(|(e, _)| e)
    }

    /// Like [`StubsConfig::from_file`], but a failure also reports every
    /// file the loader reached, including the one that failed.
    pub fn load_tracked(path: &Path) -> Result<Self, (StubError, Vec<PathBuf>)> {
        let mut loader = Loader::default();
        match loader.load_file(path) {
            Ok(()) => loader.finish().map_err(|e| (e, Vec::new())),
            Err(e) => Err((e, loader.sources)),
        }
    }

    /// Load from text. Relative paths resolve against `base_dir`.
    pub fn from_yaml(contents: &str, base_dir: &Path) -> Result<Self, StubError> {
        let mut loader = Loader::default();
        loader.load_text(contents, base_dir, "<request body>")?;
        loader.finish()
    }

    /// Swap this configuration into `repository`. The repository's `default`
    /// proxy config is kept when this configuration does not declare one.
    pub fn install(self, repository: &StubRepository) {
        let mut proxy_configs = self.proxy_configs;
        if !proxy_configs.iter().any(ProxyConfig::is_default) {
            if let Ok(current) = repository.proxy_config(DEFAULT_PROXY_CONFIG) {
                proxy_configs.push(current);
            }
        }
        repository.replace_all(self.entries, proxy_configs);
    }
}

/// Parse a document holding exactly one stub, either as a mapping or as a
/// one-element sequence.
pub fn parse_single_stub(contents: &str, base_dir: &Path) -> Result<StubEntry, StubError> {
    let value = parse_yaml(contents, "<request body>")?;
    let declaration = match value {
        Value::Sequence(mut items) if items.len() == 1 => items.remove(0),
        Value::Sequence(items) => {
            return Err(StubError::InvalidConfiguration(format!(
                "expected a single stub, found {} declarations",
                items.len()
            )))
        }
        other => other,
    };
    match classify(declaration, "stub")? {
        Declaration::Stub(stub) => StubEntry::compile(stub, base_dir),
        Declaration::Proxy { .. } => Err(StubError::InvalidConfiguration(
            "expected a stub, found a proxy-config".to_string(),
        )),
    }
}

/// Parse a document holding exactly one proxy config. The `proxy-config`
/// wrapper is optional.
pub fn parse_single_proxy_config(contents: &str) -> Result<ProxyConfig, StubError> {
    let value = parse_yaml(contents, "<request body>")?;
    let value = match value {
        Value::Sequence(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    };
    let wrapped = matches!(&value, Value::Mapping(m) if m.contains_key(PROXY_CONFIG_KEY));
    let config = if wrapped {
        serde_yaml::from_value::<ProxyDeclaration>(value).map(|d| d.proxy_config)
    } else {
        serde_yaml::from_value::<ProxyConfig>(value)
    }
    .map_err(|e| StubError::InvalidConfiguration(format!("proxy-config: {e}")))?;
    config.validate()?;
    Ok(config)
}

fn parse_yaml(contents: &str, origin: &str) -> Result<Value, StubError> {
    serde_yaml::from_str(contents)
        .map_err(|e| StubError::InvalidConfiguration(format!("{origin}: {e}")))
}

/// Decide whether a declaration is a stub or a proxy config and deserialize it.
fn classify(value: Value, context: &str) -> Result<Declaration, StubError> {
    let is_proxy = match &value {
        Value::Mapping(mapping) => mapping.contains_key(PROXY_CONFIG_KEY),
        _ => {
            return Err(StubError::InvalidConfiguration(format!(
                "{context}: a declaration must be a mapping"
            )))
        }
    };
    if is_proxy {
        let declaration: ProxyDeclaration = serde_yaml::from_value(value)
            .map_err(|e| StubError::InvalidConfiguration(format!("{context}: {e}")))?;
        Ok(Declaration::Proxy {
            proxy_config: declaration.proxy_config,
        })
    } else {
        let declaration: StubDeclaration = serde_yaml::from_value(value)
            .map_err(|e| StubError::InvalidConfiguration(format!("{context}: {e}")))?;
        Ok(Declaration::Stub(declaration))
    }
}

#[derive(Default)]
struct Loader {
    entries: Vec<StubEntry>,
    proxy_configs: Vec<ProxyConfig>,
    sources: Vec<PathBuf>,
    stub_uuids: HashSet<String>,
    proxy_uuids: HashSet<String>,
    /// Files on the current include chain.
    active: Vec<PathBuf>,
}

impl Loader {
    fn load_file(&mut self, path: &Path) -> Result<(), StubError> {
        let canonical = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) => {
                // Keep the path so a file created later is noticed.
                self.sources.push(path.to_path_buf());
                return Err(StubError::InvalidConfiguration(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        if self.active.contains(&canonical) {
            return Err(StubError::InvalidConfiguration(format!(
                "include cycle through {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(&canonical).map_err(|e| {
            StubError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!("Loading stubs from {}", canonical.display());

        let base_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.sources.push(canonical.clone());
        self.active.push(canonical);
        let result = self.load_text(&contents, &base_dir, &path.display().to_string());
        self.active.pop();
        result
    }

    fn load_text(&mut self, contents: &str, base_dir: &Path, origin: &str) -> Result<(), StubError> {
        match parse_yaml(contents, origin)? {
            Value::Null => Ok(()),
            Value::Sequence(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    let context = format!("{origin}: declaration #{index}");
                    self.add(classify(item, &context)?, base_dir, &context)?;
                }
                Ok(())
            }
            value @ Value::Mapping(_) => {
                let is_includes = matches!(&value, Value::Mapping(m) if m.contains_key(INCLUDES_KEY));
                if !is_includes {
                    return Err(StubError::InvalidConfiguration(format!(
                        "{origin}: expected a sequence of declarations or an '{INCLUDES_KEY}' mapping"
                    )));
                }
                let document: IncludesDocument = serde_yaml::from_value(value)
                    .map_err(|e| StubError::InvalidConfiguration(format!("{origin}: {e}")))?;
                for include in document.includes {
                    self.load_file(&base_dir.join(include))?;
                }
                Ok(())
            }
            _ => Err(StubError::InvalidConfiguration(format!(
                "{origin}: expected a sequence of declarations"
            ))),
        }
    }

    fn add(&mut self, declaration: Declaration, base_dir: &Path, context: &str) -> Result<(), StubError> {
        match declaration {
            Declaration::Proxy { proxy_config } => {
                proxy_config.validate()?;
                if !self.proxy_uuids.insert(proxy_config.uuid.clone()) {
                    return Err(StubError::InvalidConfiguration(format!(
                        "{context}: duplicate proxy-config uuid '{}'",
                        proxy_config.uuid
                    )));
                }
                self.proxy_configs.push(proxy_config);
            }
            Declaration::Stub(stub) => {
                if let Some(uuid) = &stub.uuid {
                    if !self.stub_uuids.insert(uuid.clone()) {
                        return Err(StubError::InvalidConfiguration(format!(
                            "{context}: duplicate stub uuid '{uuid}'"
                        )));
                    }
                }
                let entry = StubEntry::compile(stub, base_dir).map_err(|e| match e {
                    StubError::MalformedDeclaredPattern { field, reason } => {
                        StubError::MalformedDeclaredPattern {
                            field: format!("{context}: {field}"),
                            reason,
                        }
                    }
                    other => other,
                })?;
                self.entries.push(entry);
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<StubsConfig, StubError> {
        info!(
            "Parsed {} stubs and {} proxy configs from {} file(s)",
            self.entries.len(),
            self.proxy_configs.len(),
            self.sources.len()
        );
        Ok(StubsConfig {
            entries: self.entries,
            proxy_configs: self.proxy_configs,
            sources: self.sources,
        })
    }
}
