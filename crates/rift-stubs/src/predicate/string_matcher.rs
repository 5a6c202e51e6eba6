//! String matching types and compilation.
//!
//! Every declared URL, header value, query value and plain-text body is one of
//! two things: a literal (written as `{{value}}`) compared with exact equality,
//! or a regular expression searched for anywhere in the observed value. An
//! observed value equal to the declared regex text also matches.
//! Regexes are compiled once at load time and shared through a bounded
//! process-wide cache keyed by the declared text.

use crate::capture::{CaptureStore, Facet};
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};

const LITERAL_OPEN: &str = "{{";
const LITERAL_CLOSE: &str = "}}";

/// Characters that make a declared value look like a regular expression.
const REGEX_CHARS: &[char] = &[
    '$', '(', ')', '*', '+', '.', '?', '[', ']', '\\', '^', '{', '|', '}',
];

/// Most compiled patterns the cache holds at once.
pub const REGEX_CACHE_CAPACITY: usize = 500;

/// Compiled regexes keyed by pattern text. When full, the oldest insertion is
/// evicted; compiled matchers keep their own `Arc` so eviction never affects
/// a loaded stub.
#[derive(Default)]
struct RegexCache {
    entries: HashMap<String, Arc<Regex>>,
    order: VecDeque<String>,
}

impl RegexCache {
    fn get(&self, pattern: &str) -> Option<Arc<Regex>> {
        self.entries.get(pattern).cloned()
    }

    fn insert(&mut self, pattern: &str, regex: &Arc<Regex>) -> Arc<Regex> {
        if let Some(existing) = self.entries.get(pattern) {
            return Arc::clone(existing);
        }
        while self.entries.len() >= REGEX_CACHE_CAPACITY {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(pattern.to_string());
        self.entries.insert(pattern.to_string(), Arc::clone(regex));
        Arc::clone(regex)
    }
}

static REGEX_CACHE: OnceLock<RwLock<RegexCache>> = OnceLock::new();

fn regex_cache() -> &'static RwLock<RegexCache> {
    REGEX_CACHE.get_or_init(|| RwLock::new(RegexCache::default()))
}

/// Compile a declared pattern, reusing a previously compiled instance while
/// it is still cached.
///
/// `^` and `$` anchor at line boundaries and `.` matches newlines, so
/// multi-line bodies can be matched with the same patterns as single-line
/// fields.
pub fn compile_cached(pattern: &str) -> Result<Arc<Regex>, regex::Error> {
    if let Some(regex) = regex_cache().read().get(pattern) {
        return Ok(regex);
    }

    let regex = Arc::new(
        RegexBuilder::new(pattern)
            .multi_line(true)
            .dot_matches_new_line(true)
            .build()?,
    );
    Ok(regex_cache().write().insert(pattern, &regex))
}

/// Number of compiled patterns currently cached.
pub fn cached_pattern_count() -> usize {
    regex_cache().read().entries.len()
}

/// Strip the literal wrapper from a declared value, if present.
pub fn literal_value(declared: &str) -> Option<&str> {
    declared
        .strip_prefix(LITERAL_OPEN)
        .and_then(|rest| rest.strip_suffix(LITERAL_CLOSE))
}

/// Cheap heuristic: does this value contain enough regex syntax to be worth
/// treating as a pattern? Used for scalar values nested in JSON documents,
/// where most strings are plain data.
pub fn looks_like_regex(value: &str) -> bool {
    if value.chars().count() < 2 {
        return false;
    }
    if value.starts_with('^') || value.ends_with('$') {
        return true;
    }
    value.chars().filter(|c| REGEX_CHARS.contains(c)).take(2).count() == 2
}

/// Compiled string matcher for efficient runtime evaluation.
#[derive(Debug, Clone)]
pub enum StringMatcher {
    /// Exact equality against the unwrapped value.
    Literal(String),
    /// Regex searched anywhere in the observed value.
    Pattern { source: String, regex: Arc<Regex> },
}

impl StringMatcher {
    /// Compile a declared value into a matcher.
    pub fn compile(declared: &str) -> Result<Self, regex::Error> {
        if let Some(literal) = literal_value(declared) {
            return Ok(StringMatcher::Literal(literal.to_string()));
        }
        let regex = compile_cached(declared)?;
        Ok(StringMatcher::Pattern {
            source: declared.to_string(),
            regex,
        })
    }

    /// The value as it was declared, literal wrapper included.
    pub fn declared(&self) -> String {
        match self {
            StringMatcher::Literal(value) => format!("{LITERAL_OPEN}{value}{LITERAL_CLOSE}"),
            StringMatcher::Pattern { source, .. } => source.clone(),
        }
    }

    /// Check an observed value. On a regex hit, every numbered group is
    /// recorded as `<facet>.<name>.<group>`.
    pub fn matches(
        &self,
        observed: &str,
        facet: Facet,
        name: &str,
        captures: &mut CaptureStore,
    ) -> bool {
        match self {
            StringMatcher::Literal(value) => value == observed,
            StringMatcher::Pattern { source, regex } => match regex.captures(observed) {
                Some(caps) => {
                    captures.record(facet, name, &caps);
                    true
                }
                None => source == observed,
            },
        }
    }

    /// Check without recording captures.
    pub fn is_match(&self, observed: &str) -> bool {
        match self {
            StringMatcher::Literal(value) => value == observed,
            StringMatcher::Pattern { source, regex } => {
                regex.is_match(observed) || source == observed
            }
        }
    }
}

impl PartialEq for StringMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.declared() == other.declared()
    }
}
