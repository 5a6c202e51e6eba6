//! Request matching for stub declarations.
//!
//! A declared request pattern is compiled once, when stubs are loaded, into
//! matchers for each facet of a request:
//!
//! - `string_matcher` - literal (`{{...}}`) or regex match of a single value
//! - `field_matcher` - method set, header and query parameter maps
//! - `body_matcher` - body classification (JSON, XML, regex, literal)
//! - `deep_equals` - non-extensible JSON comparison
//! - `xml_compare` - XML similarity with placeholders
//! - `request` - the declared pattern, its compiled form and the observed request
//!
//! Regex matches record their capture groups in a [`CaptureStore`](crate::capture::CaptureStore)
//! so the response can be rendered from them.

mod body_matcher;
mod deep_equals;
mod field_matcher;
mod pairing;
mod request;
mod string_matcher;
mod xml_compare;

pub use body_matcher::{BodyKind, BodyMatcher, BodyPatternError, MediaFamily};
pub use deep_equals::{escape_json_for_regex, json_non_extensible_equals};
pub use field_matcher::{FieldMatcher, MethodMatcher};
pub use request::{parse_query_string, CompiledRequestPattern, ObservedRequest, RequestPattern};
pub use string_matcher::{
    cached_pattern_count, compile_cached, literal_value, looks_like_regex, StringMatcher,
};
pub use xml_compare::XmlNode;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling a declared request pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid regex in {field}: {source}")]
    Regex {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("{field}: {source}")]
    Body {
        field: String,
        #[source]
        source: BodyPatternError,
    },

    #[error("cannot read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatternError {
    /// Declared field the error refers to.
    pub fn field(&self) -> String {
        match self {
            PatternError::Regex { field, .. } | PatternError::Body { field, .. } => field.clone(),
            PatternError::File { .. } => "request.file".to_string(),
        }
    }
}
