//! Body matching configuration and compilation.
//!
//! A declared body is classified once, at load time, into one of four kinds
//! and matched by dispatching on that kind:
//!
//! | kind      | chosen when                                              |
//! |-----------|----------------------------------------------------------|
//! | `Json`    | declared content type is JSON, or the text is an object/array |
//! | `Xml`     | declared content type is XML, or the text parses as XML   |
//! | `Literal` | the text is wrapped as `{{...}}`, or is not a valid regex |
//! | `Regex`   | anything else                                            |

use super::deep_equals::{escape_json_for_regex, json_non_extensible_equals};
use super::string_matcher::{compile_cached, literal_value, StringMatcher};
use super::xml_compare::XmlNode;
use crate::capture::{CaptureStore, Facet};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Position under which body captures are recorded (`post.0.N`).
const BODY_CAPTURE_NAME: &str = "0";

/// Body pattern kind, decided at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Xml,
    Regex,
    Literal,
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BodyKind::Json => "json",
            BodyKind::Xml => "xml",
            BodyKind::Regex => "regex",
            BodyKind::Literal => "literal",
        };
        f.write_str(name)
    }
}

/// Media type family inferred from a `Content-Type` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFamily {
    Json,
    Xml,
    Other,
}

impl MediaFamily {
    /// `application/json`, `application/vnd.api+json; charset=utf-8` and
    /// `text/xml` style values are recognised by their subtype suffix.
    pub fn of(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return MediaFamily::Other;
        };
        let essence = content_type.split(';').next().unwrap_or("").trim();
        let subtype = essence.rsplit('/').next().unwrap_or("");
        let suffix = subtype.rsplit('+').next().unwrap_or("").to_ascii_lowercase();
        match suffix.as_str() {
            "json" => MediaFamily::Json,
            "xml" => MediaFamily::Xml,
            _ => MediaFamily::Other,
        }
    }
}

/// Raw-text comparison used when structural comparison is not possible.
#[derive(Debug, Clone)]
enum RawFallback {
    Search(Arc<Regex>),
    Exact,
}

impl RawFallback {
    fn for_text(text: &str) -> Self {
        compile_cached(text)
            .map(RawFallback::Search)
            .unwrap_or(RawFallback::Exact)
    }

    fn matches(
        &self,
        declared: &str,
        observed: &str,
        captures: &mut CaptureStore,
    ) -> bool {
        match self {
            RawFallback::Search(regex) => match regex.captures(observed) {
                Some(caps) => {
                    captures.record(Facet::Post, BODY_CAPTURE_NAME, &caps);
                    true
                }
                None => declared == observed,
            },
            RawFallback::Exact => declared == observed,
        }
    }
}

/// Error raised when a declared body cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} body pattern: {reason}")]
pub struct BodyPatternError {
    pub kind: BodyKind,
    pub reason: String,
}

/// Compiled body matcher for efficient runtime evaluation.
#[derive(Debug, Clone)]
pub enum BodyMatcher {
    Json {
        source: String,
        document: serde_json::Value,
        fallback: RawFallbackMatcher,
    },
    Xml {
        source: String,
        document: XmlNode,
        fallback: RawFallbackMatcher,
    },
    Regex(StringMatcher),
    Literal { source: String, value: String },
}

/// Opaque wrapper so the fallback strategy stays private to this module.
#[derive(Debug, Clone)]
pub struct RawFallbackMatcher(RawFallback);

impl BodyMatcher {
    /// Classify and compile a declared body. `declared_content_type` is the
    /// request pattern's own `content-type` header, when it has one.
    pub fn compile(
        declared: &str,
        declared_content_type: Option<&str>,
    ) -> Result<Self, BodyPatternError> {
        match MediaFamily::of(declared_content_type) {
            MediaFamily::Json => return Self::json(declared),
            MediaFamily::Xml => return Self::xml(declared),
            MediaFamily::Other => {}
        }

        if let Some(literal) = literal_value(declared) {
            return Ok(BodyMatcher::Literal {
                source: declared.to_string(),
                value: literal.to_string(),
            });
        }

        let trimmed = declared.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(matcher) = Self::json(declared) {
                return Ok(matcher);
            }
        }
        if trimmed.starts_with('<') {
            if let Ok(document) = XmlNode::parse(declared) {
                return Self::xml_document(declared, document);
            }
        }

        Ok(match StringMatcher::compile(declared) {
            Ok(matcher) => BodyMatcher::Regex(matcher),
            Err(_) => BodyMatcher::Literal {
                source: declared.to_string(),
                value: declared.to_string(),
            },
        })
    }

    fn json(declared: &str) -> Result<Self, BodyPatternError> {
        let document = serde_json::from_str(declared).map_err(|e| BodyPatternError {
            kind: BodyKind::Json,
            reason: e.to_string(),
        })?;
        Ok(BodyMatcher::Json {
            source: declared.to_string(),
            document,
            fallback: RawFallbackMatcher(RawFallback::for_text(&escape_json_for_regex(
                declared,
            ))),
        })
    }

    fn xml(declared: &str) -> Result<Self, BodyPatternError> {
        let document = XmlNode::parse(declared).map_err(|reason| BodyPatternError {
            kind: BodyKind::Xml,
            reason,
        })?;
        Self::xml_document(declared, document)
    }

    fn xml_document(declared: &str, document: XmlNode) -> Result<Self, BodyPatternError> {
        document
            .validate_placeholders()
            .map_err(|reason| BodyPatternError {
                kind: BodyKind::Xml,
                reason,
            })?;
        Ok(BodyMatcher::Xml {
            source: declared.to_string(),
            document,
            fallback: RawFallbackMatcher(RawFallback::for_text(declared)),
        })
    }

    pub fn kind(&self) -> BodyKind {
        match self {
            BodyMatcher::Json { .. } => BodyKind::Json,
            BodyMatcher::Xml { .. } => BodyKind::Xml,
            BodyMatcher::Regex(_) => BodyKind::Regex,
            BodyMatcher::Literal { .. } => BodyKind::Literal,
        }
    }

    /// The body text as declared.
    pub fn declared(&self) -> String {
        match self {
            BodyMatcher::Json { source, .. }
            | BodyMatcher::Xml { source, .. }
            | BodyMatcher::Literal { source, .. } => source.clone(),
            BodyMatcher::Regex(matcher) => matcher.declared(),
        }
    }

    /// Match an observed body. A missing or empty body never matches a
    /// declared pattern.
    pub fn matches(
        &self,
        observed: Option<&str>,
        observed_content_type: Option<&str>,
        captures: &mut CaptureStore,
    ) -> bool {
        let Some(observed) = observed.filter(|b| !b.is_empty()) else {
            return false;
        };
        let family = MediaFamily::of(observed_content_type);

        match self {
            BodyMatcher::Json {
                source,
                document,
                fallback,
            } => {
                if family == MediaFamily::Json {
                    if let Ok(actual) = serde_json::from_str::<serde_json::Value>(observed) {
                        if json_non_extensible_equals(document, &actual) {
                            return true;
                        }
                    }
                }
                fallback.0.matches(source, observed, captures)
            }
            BodyMatcher::Xml {
                source,
                document,
                fallback,
            } => {
                if family == MediaFamily::Xml {
                    if let Ok(actual) = XmlNode::parse(observed) {
                        if document.similar_to(&actual) {
                            return true;
                        }
                    }
                }
                fallback.0.matches(source, observed, captures)
            }
            BodyMatcher::Regex(matcher) => {
                matcher.matches(observed, Facet::Post, BODY_CAPTURE_NAME, captures)
            }
            BodyMatcher::Literal { value, .. } => value == observed,
        }
    }
}
