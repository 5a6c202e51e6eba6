//! Lenient scalar deserializers for YAML fields.
//!
//! YAML authors write `status: 200`, `query: {id: 42}` or `method: GET`; the
//! stub model keeps these as strings and lists of strings.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Str(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Uint(u) => u.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Null => String::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Scalar),
    Many(Vec<Scalar>),
}

/// `Option<String>` from any scalar.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|s| match s {
        Scalar::Null => None,
        other => Some(other.into_string()),
    }))
}

/// Map of string keys to any scalar.
pub fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<BTreeMap<String, Scalar>> = Option::deserialize(deserializer)?;
    Ok(value
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.into_string()))
        .collect())
}

/// A single scalar or a list of scalars.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(match value {
        None => Vec::new(),
        Some(OneOrMany::One(Scalar::Null)) => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s.into_string()],
        Some(OneOrMany::Many(items)) => items.into_iter().map(Scalar::into_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "opt_string")]
        status: Option<String>,
        #[serde(default, deserialize_with = "string_map")]
        query: BTreeMap<String, String>,
        #[serde(default, deserialize_with = "string_list")]
        method: Vec<String>,
    }

    #[test]
    fn test_scalars_become_strings() {
        let sample: Sample =
            serde_yaml::from_str("status: 201\nquery: {id: 42, flag: true}\nmethod: GET\n")
                .unwrap();
        assert_eq!(sample.status.as_deref(), Some("201"));
        assert_eq!(sample.query["id"], "42");
        assert_eq!(sample.query["flag"], "true");
        assert_eq!(sample.method, vec!["GET"]);
    }

    #[test]
    fn test_lists_and_missing_fields() {
        let sample: Sample = serde_yaml::from_str("method: [GET, HEAD]\n").unwrap();
        assert!(sample.status.is_none());
        assert!(sample.query.is_empty());
        assert_eq!(sample.method, vec!["GET", "HEAD"]);
    }
}
