//! Declarations, proxy configs and error types shared by the stub engine.

use crate::config::scalar;
use crate::predicate::{PatternError, RequestPattern};
use bytes::Bytes;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Uuid of the proxy config used when a request selects none.
pub const DEFAULT_PROXY_CONFIG: &str = "default";

/// Request header naming the proxy config to delegate unmatched requests to.
pub const PROXY_CONFIG_HEADER: &str = "x-stubby-proxy-config";

/// Round-trip id sent upstream with a proxied request.
pub const PROXY_REQUEST_HEADER: &str = "x-stubby-proxy-request";

/// Round-trip id returned with a proxied response; equals the request's.
pub const PROXY_RESPONSE_HEADER: &str = "x-stubby-proxy-response";

/// Response header carrying the rank of the stub that served a request.
pub const RESOURCE_ID_HEADER: &str = "x-stubby-resource-id";

// ============================================================================
// Error Types
// ============================================================================

/// Error types for stub lookup and repository management
#[derive(Debug, thiserror::Error)]
pub enum StubError {
    #[error("No stub matched {method} {path}")]
    NoMatch { method: String, path: String },
    #[error("Stub index {0} out of bounds")]
    IndexOutOfRange(usize),
    #[error("Stub with uuid '{0}' not found")]
    UuidNotFound(String),
    #[error("Proxy config with uuid '{0}' not found")]
    ProxyConfigNotFound(String),
    #[error("The 'default' proxy config cannot be updated or deleted")]
    DefaultProxyConfigImmutable,
    #[error("Malformed pattern in {field}: {reason}")]
    MalformedDeclaredPattern { field: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<PatternError> for StubError {
    fn from(err: PatternError) -> Self {
        match err {
            PatternError::File { .. } => StubError::InvalidConfiguration(err.to_string()),
            other => StubError::MalformedDeclaredPattern {
                field: other.field(),
                reason: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// Serving policy tag of a response. Carried through dumps only.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePolicy {
    Once,
    Repeat,
}

/// A response as declared in configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResponsePattern {
    /// Status code, possibly holding render tokens. Defaults to 200.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar::opt_string"
    )]
    pub status: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar::string_map"
    )]
    pub headers: BTreeMap<String, String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar::opt_string"
    )]
    pub body: Option<String>,

    /// Body read from a file relative to the configuration. The path may
    /// hold render tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Delay before responding, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<ResponsePolicy>,
}

impl ResponsePattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_latency(mut self, millis: u64) -> Self {
        self.latency = Some(millis);
        self
    }
}

/// A stub as declared in configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StubDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar::opt_string"
    )]
    pub uuid: Option<String>,

    pub request: RequestPattern,

    /// One mapping or a sequence of mappings.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many_responses",
        serialize_with = "serialize_responses"
    )]
    pub response: Vec<ResponsePattern>,
}

impl StubDeclaration {
    pub fn new(request: RequestPattern) -> Self {
        Self {
            description: None,
            uuid: None,
            request,
            response: Vec::new(),
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_response(mut self, response: ResponsePattern) -> Self {
        self.response.push(response);
        self
    }
}

fn one_or_many_responses<'de, D>(deserializer: D) -> Result<Vec<ResponsePattern>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Sequence(_) => serde_yaml::from_value(value).map_err(D::Error::custom),
        other => serde_yaml::from_value(other)
            .map(|single| vec![single])
            .map_err(D::Error::custom),
    }
}

fn serialize_responses<S>(responses: &[ResponsePattern], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match responses {
        [single] => single.serialize(serializer),
        many => many.serialize(serializer),
    }
}

/// Upstream forwarding strategy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyStrategy {
    /// Forward the request untouched.
    #[default]
    AsIs,
    /// Add the config's headers to the forwarded request.
    Additive,
}

fn default_proxy_uuid() -> String {
    DEFAULT_PROXY_CONFIG.to_string()
}

/// Where unmatched requests are forwarded.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_uuid")]
    pub uuid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub strategy: ProxyStrategy,

    #[serde(default, deserialize_with = "scalar::string_map")]
    pub properties: BTreeMap<String, String>,

    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar::string_map"
    )]
    pub headers: BTreeMap<String, String>,
}

impl ProxyConfig {
    pub fn new(uuid: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("endpoint".to_string(), endpoint.into());
        Self {
            uuid: uuid.into(),
            description: None,
            strategy: ProxyStrategy::AsIs,
            properties,
            headers: BTreeMap::new(),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.properties.get("endpoint").map(String::as_str)
    }

    pub fn is_default(&self) -> bool {
        self.uuid == DEFAULT_PROXY_CONFIG
    }

    /// Check the config carries a usable endpoint.
    pub fn validate(&self) -> Result<(), StubError> {
        if self.uuid.trim().is_empty() {
            return Err(StubError::InvalidConfiguration(
                "proxy-config uuid must not be empty".to_string(),
            ));
        }
        match self.endpoint() {
            Some(endpoint) if endpoint.starts_with("http://") || endpoint.starts_with("https://") => {
                Ok(())
            }
            Some(endpoint) => Err(StubError::InvalidConfiguration(format!(
                "proxy-config '{}' endpoint '{}' must be an http(s) URL",
                self.uuid, endpoint
            ))),
            None => Err(StubError::InvalidConfiguration(format!(
                "proxy-config '{}' is missing properties.endpoint",
                self.uuid
            ))),
        }
    }
}

/// One entry of a configuration document, in dump order.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Declaration {
    Proxy {
        #[serde(rename = "proxy-config")]
        proxy_config: ProxyConfig,
    },
    Stub(StubDeclaration),
}

// ============================================================================
// Rendered output
// ============================================================================

/// A response ready to be written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub latency: Option<Duration>,
}

/// Hit counter of one stub, as reported by the admin status endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceStat {
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub hits: u64,
}
