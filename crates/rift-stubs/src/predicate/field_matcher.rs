//! Field matchers for the HTTP method, headers and query parameters.
//!
//! Headers and query parameters share one map matcher: every declared key must
//! be present in the observed map and its value must pass the declared
//! [`StringMatcher`]. Observed keys that were not declared are ignored.

use super::string_matcher::StringMatcher;
use crate::capture::{CaptureStore, Facet};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Set of acceptable HTTP methods. Empty means any method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodMatcher {
    methods: BTreeSet<String>,
}

impl MethodMatcher {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            methods: methods
                .into_iter()
                .map(|m| m.as_ref().trim().to_uppercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, observed: &str) -> bool {
        self.methods.is_empty() || self.methods.contains(&observed.to_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }
}

/// Compiled matcher for a declared name -> pattern map.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatcher {
    facet: Facet,
    fields: BTreeMap<String, StringMatcher>,
}

impl FieldMatcher {
    /// Compile header patterns. Header names are case-insensitive and stored
    /// lower-cased.
    pub fn headers<'a, I>(declared: I) -> Result<Self, (String, regex::Error)>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        Self::compile(
            Facet::Header,
            declared
                .into_iter()
                .map(|(name, value)| (name.to_lowercase(), value.as_str())),
        )
    }

    /// Compile query parameter patterns. Names keep their case.
    pub fn query<'a, I>(declared: I) -> Result<Self, (String, regex::Error)>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        Self::compile(
            Facet::Query,
            declared
                .into_iter()
                .map(|(name, value)| (name.clone(), value.as_str())),
        )
    }

    fn compile<'a>(
        facet: Facet,
        declared: impl Iterator<Item = (String, &'a str)>,
    ) -> Result<Self, (String, regex::Error)> {
        let mut fields = BTreeMap::new();
        for (name, value) in declared {
            let matcher = StringMatcher::compile(value).map_err(|e| (name.clone(), e))?;
            fields.insert(name, matcher);
        }
        Ok(Self { facet, fields })
    }

    /// Match an observed map. Captures are recorded only when every declared
    /// field matches.
    pub fn matches(&self, observed: &HashMap<String, String>, captures: &mut CaptureStore) -> bool {
        if self.fields.is_empty() {
            return true;
        }

        let mut local = CaptureStore::new();
        for (name, matcher) in &self.fields {
            match observed.get(name) {
                Some(value) if matcher.matches(value, self.facet, name, &mut local) => {}
                _ => return false,
            }
        }
        captures.merge(local);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Declared values, keyed by field name.
    pub fn declared(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(name, matcher)| (name.clone(), matcher.declared()))
            .collect()
    }
}
