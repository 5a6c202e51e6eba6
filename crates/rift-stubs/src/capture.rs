//! Per-request capture group storage.
//!
//! Regex matchers record every numbered group they see under a dotted key
//! `<facet>.<name-or-position>.<group>`, for example `url.0.1` or
//! `query.id.2`. The response renderer looks values up by the same key.

use regex::Captures;
use std::collections::BTreeMap;
use std::fmt;

/// Request facet a capture group was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Url,
    Query,
    Header,
    Post,
}

impl Facet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Url => "url",
            Facet::Query => "query",
            Facet::Header => "header",
            Facet::Post => "post",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scratch map of capture groups gathered while matching one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStore {
    groups: BTreeMap<String, String>,
}

impl CaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the lookup key for a capture group.
    pub fn key(facet: Facet, name: &str, group: usize) -> String {
        format!("{}.{}.{}", facet, name, group)
    }

    /// Record every participating group of a regex match. Group 0 is the
    /// whole match.
    pub fn record(&mut self, facet: Facet, name: &str, captures: &Captures<'_>) {
        for (group, value) in captures.iter().enumerate() {
            if let Some(value) = value {
                self.groups
                    .insert(Self::key(facet, name, group), value.as_str().to_string());
            }
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.groups.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.groups.get(key).map(String::as_str)
    }

    /// Move all groups of `other` into this store, overwriting equal keys.
    pub fn merge(&mut self, other: CaptureStore) {
        self.groups.extend(other.groups);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
