//! Request patterns: the declared shape, its compiled form, and the observed
//! request it is matched against.

use super::body_matcher::BodyMatcher;
use super::field_matcher::{FieldMatcher, MethodMatcher};
use super::string_matcher::{literal_value, StringMatcher};
use super::PatternError;
use crate::auth::Authorization;
use crate::capture::{CaptureStore, Facet};
use crate::config::scalar;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// Position under which URL captures are recorded (`url.0.N`).
const URL_CAPTURE_NAME: &str = "0";

/// A request pattern as declared in configuration.
///
/// Every field is optional; an unset field matches anything.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RequestPattern {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar::opt_string"
    )]
    pub url: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "scalar::string_list"
    )]
    pub method: Vec<String>,

    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar::string_map"
    )]
    pub headers: BTreeMap<String, String>,

    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar::string_map"
    )]
    pub query: BTreeMap<String, String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar::opt_string"
    )]
    pub post: Option<String>,

    /// Body pattern read from a file relative to the configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl RequestPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method.push(method.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_post(mut self, body: impl Into<String>) -> Self {
        self.post = Some(body.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Declared `content-type` header with any literal wrapper removed.
    fn declared_content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| literal_value(value).unwrap_or(value))
    }
}

/// Compiled request pattern for efficient runtime evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRequestPattern {
    pattern: RequestPattern,
    url: Option<StringMatcher>,
    methods: MethodMatcher,
    headers: FieldMatcher,
    query: FieldMatcher,
    body: Option<BodyMatcher>,
    authorization: Option<Authorization>,
}

impl CompiledRequestPattern {
    /// Compile a declared pattern. `base_dir` resolves a relative `file`.
    pub fn compile(pattern: RequestPattern, base_dir: &Path) -> Result<Self, PatternError> {
        let url = pattern
            .url
            .as_deref()
            .map(StringMatcher::compile)
            .transpose()
            .map_err(|source| PatternError::Regex {
                field: "request.url".to_string(),
                source,
            })?;

        let methods = MethodMatcher::new(&pattern.method);

        let headers = FieldMatcher::headers(
            pattern
                .headers
                .iter()
                .filter(|(name, _)| !Authorization::is_pseudo_header(name)),
        )
        .map_err(|(name, source)| PatternError::Regex {
            field: format!("request.headers.{name}"),
            source,
        })?;

        let query = FieldMatcher::query(&pattern.query).map_err(|(name, source)| {
            PatternError::Regex {
                field: format!("request.query.{name}"),
                source,
            }
        })?;

        let body_text = match (&pattern.file, &pattern.post) {
            (Some(file), _) => {
                let path = base_dir.join(file);
                Some(
                    std::fs::read_to_string(&path)
                        .map_err(|source| PatternError::File { path, source })?,
                )
            }
            (None, Some(post)) => Some(post.clone()),
            (None, None) => None,
        };
        let body = body_text
            .map(|text| BodyMatcher::compile(&text, pattern.declared_content_type()))
            .transpose()
            .map_err(|source| PatternError::Body {
                field: "request.post".to_string(),
                source,
            })?;

        let authorization = Authorization::from_declared_headers(&pattern.headers);

        Ok(Self {
            pattern,
            url,
            methods,
            headers,
            query,
            body,
            authorization,
        })
    }

    /// Run the facets in order (URL, method, headers, query, body), stopping
    /// at the first one that fails. Captures are written only on success.
    pub fn matches(&self, request: &ObservedRequest, captures: &mut CaptureStore) -> bool {
        let mut local = CaptureStore::new();

        if let Some(url) = &self.url {
            if !url.matches(&request.path, Facet::Url, URL_CAPTURE_NAME, &mut local) {
                return false;
            }
        }
        if !self.methods.matches(&request.method) {
            return false;
        }
        if !self.headers.matches(&request.headers, &mut local) {
            return false;
        }
        if !self.query.matches(&request.query, &mut local) {
            return false;
        }
        if let Some(body) = &self.body {
            if !body.matches(request.body.as_deref(), request.content_type(), &mut local) {
                return false;
            }
        }

        captures.merge(local);
        true
    }

    pub fn pattern(&self) -> &RequestPattern {
        &self.pattern
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    pub fn body(&self) -> Option<&BodyMatcher> {
        self.body.as_ref()
    }

    pub fn methods(&self) -> &MethodMatcher {
        &self.methods
    }

    /// Declared URL, if any.
    pub fn url(&self) -> Option<&str> {
        self.pattern.url.as_deref()
    }
}

/// An incoming request in the shape the matchers understand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedRequest {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    pub raw_query: Option<String>,
    pub query: HashMap<String, String>,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl ObservedRequest {
    /// Build from a method and a `path?query` string.
    pub fn new(method: &str, path_and_query: &str) -> Self {
        let (path, raw_query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (path_and_query.to_string(), None),
        };
        Self {
            method: method.to_uppercase(),
            path,
            query: parse_query_string(raw_query.as_deref()),
            raw_query,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Path with the original query string re-attached.
    pub fn path_and_query(&self) -> String {
        match &self.raw_query {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }
}

/// Parse query string into a HashMap. Keys and values are percent-decoded
/// the same way; a pair that does not decode to UTF-8 is skipped.
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let Some(q) = query else {
        return params;
    };
    for pair in q.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match (urlencoding::decode(key), urlencoding::decode(value)) {
            (Ok(key), Ok(value)) => {
                params.insert(key.into_owned(), value.into_owned());
            }
            _ => debug!("Skipping query parameter that is not valid UTF-8: {}", pair),
        }
    }
    params
}
