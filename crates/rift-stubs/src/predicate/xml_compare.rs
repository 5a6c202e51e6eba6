//! XML tree comparison for declared request bodies.
//!
//! Documents are parsed with `sxd-document` and converted into an owned tree
//! so declared patterns can be shared across threads. Two trees are similar
//! when elements agree on name, namespace and attributes, and their children
//! can be paired one-to-one regardless of order. Text is whitespace-normalized;
//! comments and processing instructions are ignored.
//!
//! Declared text and attribute values may hold placeholders:
//!
//! - `${xmlunit.ignore}`
//! - `${xmlunit.isNumber}`
//! - `${xmlunit.isDateTime}` or `${xmlunit.isDateTime(<strftime format>)}`
//! - `${xmlunit.matchesRegex(<regex>)}`

use super::pairing::perfect_pairing;
use super::string_matcher::compile_cached;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

const XMLNS_URI: &str = "http://www.w3.org/2000/xmlns/";

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)^\$\{xmlunit\.([A-Za-z]+)(?:\((.*)\))?\}$").unwrap()
    })
}

/// Owned XML element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Self, String> {
        let package = parser::parse(xml).map_err(|e| format!("{e:?}"))?;
        let document = package.as_document();
        let root_element = document
            .root()
            .children()
            .into_iter()
            .find_map(|child| match child {
                ChildOfRoot::Element(element) => Some(Self::from_element(element)),
                _ => None,
            });
        root_element.ok_or_else(|| "document has no root element".to_string())
    }

    fn from_element(element: Element<'_>) -> Self {
        let name = element.name();
        let attributes = element
            .attributes()
            .into_iter()
            .filter(|attr| {
                let qname = attr.name();
                qname.namespace_uri() != Some(XMLNS_URI) && qname.local_part() != "xmlns"
            })
            .map(|attr| {
                let qname = attr.name();
                let key = match qname.namespace_uri() {
                    Some(ns) => format!("{{{}}}{}", ns, qname.local_part()),
                    None => qname.local_part().to_string(),
                };
                (key, attr.value().to_string())
            })
            .collect();

        let mut text = String::new();
        let mut children = Vec::new();
        for child in element.children() {
            match child {
                ChildOfElement::Element(e) => children.push(Self::from_element(e)),
                ChildOfElement::Text(t) => text.push_str(t.text()),
                _ => {}
            }
        }

        Self {
            namespace: name.namespace_uri().map(str::to_string),
            name: name.local_part().to_string(),
            attributes,
            text: normalize_whitespace(&text),
            children,
        }
    }

    /// Check every placeholder in this declared tree, so a bad
    /// `matchesRegex` pattern is reported at load time.
    pub fn validate_placeholders(&self) -> Result<(), String> {
        validate_placeholder(&self.text)?;
        for value in self.attributes.values() {
            validate_placeholder(value)?;
        }
        self.children
            .iter()
            .try_for_each(XmlNode::validate_placeholders)
    }

    /// Compare this declared tree against an observed one.
    pub fn similar_to(&self, observed: &XmlNode) -> bool {
        self.same_node(observed)
            && values_match(&self.text, &observed.text)
            && children_match(&self.children, &observed.children)
    }

    /// Node identity used to pair children: name, namespace and all attributes.
    fn same_node(&self, observed: &XmlNode) -> bool {
        self.name == observed.name
            && self.namespace == observed.namespace
            && self.attributes.len() == observed.attributes.len()
            && self.attributes.iter().all(|(key, expected)| {
                observed
                    .attributes
                    .get(key)
                    .is_some_and(|actual| values_match(expected, actual))
            })
    }
}

fn children_match(expected: &[XmlNode], actual: &[XmlNode]) -> bool {
    perfect_pairing(expected, actual, XmlNode::similar_to)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn anchored(pattern: &str) -> String {
    format!(r"\A(?:{pattern})\z")
}

fn validate_placeholder(value: &str) -> Result<(), String> {
    let Some(caps) = get_placeholder_regex().captures(value.trim()) else {
        return Ok(());
    };
    match (&caps[1], caps.get(2).map(|m| m.as_str())) {
        ("matchesRegex", Some(pattern)) => compile_cached(&anchored(pattern))
            .map(|_| ())
            .map_err(|e| format!("invalid matchesRegex pattern '{pattern}': {e}")),
        ("matchesRegex", None) => Err("matchesRegex needs a pattern".to_string()),
        _ => Ok(()),
    }
}

/// Compare a declared value (possibly a placeholder) with an observed one.
fn values_match(expected: &str, actual: &str) -> bool {
    let Some(caps) = get_placeholder_regex().captures(expected.trim()) else {
        return expected == actual;
    };
    let argument = caps.get(2).map(|m| m.as_str());

    match (&caps[1], argument) {
        ("ignore", _) => true,
        ("isNumber", _) => actual.trim().parse::<f64>().is_ok(),
        ("isDateTime", None) => is_date_time(actual.trim()),
        ("isDateTime", Some(format)) => is_date_time_with_format(actual.trim(), format),
        ("matchesRegex", Some(pattern)) => compile_cached(&anchored(pattern))
            .map(|regex| regex.is_match(actual))
            .unwrap_or(false),
        _ => expected == actual,
    }
}

fn is_date_time(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || DateTime::parse_from_rfc2822(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn is_date_time_with_format(value: &str, format: &str) -> bool {
    DateTime::parse_from_str(value, format).is_ok()
        || NaiveDateTime::parse_from_str(value, format).is_ok()
        || NaiveDate::parse_from_str(value, format).is_ok()
}
