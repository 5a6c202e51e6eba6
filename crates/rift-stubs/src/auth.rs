//! Authorization requirements declared on stub requests.
//!
//! Stubs declare credentials with pseudo-headers rather than a literal
//! `authorization` header:
//!
//! ```yaml
//! request:
//!   headers:
//!     authorization-basic: "bob:secret"   # sent as "Basic Ym9iOnNlY3JldA=="
//!     authorization-bearer: "abc123"      # sent as "Bearer abc123"
//!     authorization-custom: "Token xyz"   # sent as-is
//! ```
//!
//! The check runs after a stub has matched, so a wrong or missing header
//! yields `401` instead of falling through to the next stub.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::BTreeMap;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const BASIC_PSEUDO_HEADER: &str = "authorization-basic";
pub const BEARER_PSEUDO_HEADER: &str = "authorization-bearer";
pub const CUSTOM_PSEUDO_HEADER: &str = "authorization-custom";

/// Expected `Authorization` header value for a stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Basic(String),
    Bearer(String),
    Custom(String),
}

/// Result of checking an observed request against a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted,
    Missing,
    Mismatch,
}

impl Authorization {
    /// Is `name` one of the pseudo-headers (case-insensitive)?
    pub fn is_pseudo_header(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        lower == BASIC_PSEUDO_HEADER || lower == BEARER_PSEUDO_HEADER || lower == CUSTOM_PSEUDO_HEADER
    }

    /// Pull the first declared pseudo-header out of a header map. Basic wins
    /// over bearer, bearer over custom.
    pub fn from_declared_headers(headers: &BTreeMap<String, String>) -> Option<Self> {
        let find = |wanted: &str| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| value.trim().to_string())
        };

        if let Some(credentials) = find(BASIC_PSEUDO_HEADER) {
            return Some(Authorization::Basic(credentials));
        }
        if let Some(token) = find(BEARER_PSEUDO_HEADER) {
            return Some(Authorization::Bearer(token));
        }
        find(CUSTOM_PSEUDO_HEADER).map(Authorization::Custom)
    }

    /// Header value a client must send.
    pub fn expected_header(&self) -> String {
        match self {
            Authorization::Basic(credentials) => {
                format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
            }
            Authorization::Bearer(token) => format!("Bearer {token}"),
            Authorization::Custom(value) => value.clone(),
        }
    }

    pub fn check(&self, observed: Option<&str>) -> AuthOutcome {
        match observed {
            None => AuthOutcome::Missing,
            Some(value) if value.trim() == self.expected_header() => AuthOutcome::Granted,
            Some(_) => AuthOutcome::Mismatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_basic_authorization_encodes_credentials() {
        let auth = Authorization::from_declared_headers(&headers(&[(
            "authorization-basic",
            " bob:secret ",
        )]))
        .unwrap();
        assert_eq!(auth.expected_header(), "Basic Ym9iOnNlY3JldA==");
        assert_eq!(auth.check(Some("Basic Ym9iOnNlY3JldA==")), AuthOutcome::Granted);
        assert_eq!(auth.check(Some("Basic d3Jvbmc=")), AuthOutcome::Mismatch);
        assert_eq!(auth.check(None), AuthOutcome::Missing);
    }

    #[test]
    fn test_bearer_and_custom() {
        let bearer =
            Authorization::from_declared_headers(&headers(&[("Authorization-Bearer", "abc")]))
                .unwrap();
        assert_eq!(bearer.check(Some("Bearer abc")), AuthOutcome::Granted);

        let custom =
            Authorization::from_declared_headers(&headers(&[("authorization-custom", "Token x")]))
                .unwrap();
        assert_eq!(custom.check(Some("Token x")), AuthOutcome::Granted);
    }

    #[test]
    fn test_no_pseudo_header() {
        assert!(Authorization::from_declared_headers(&headers(&[("accept", "*/*")])).is_none());
        assert!(Authorization::is_pseudo_header("AUTHORIZATION-BASIC"));
        assert!(!Authorization::is_pseudo_header("authorization"));
    }
}
