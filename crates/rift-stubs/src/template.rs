//! Response token rendering.
//!
//! Response status, body, header values and file paths may reference capture
//! groups recorded while matching the request:
//!
//! - `<% url.0.1 %>` - first group of the URL regex
//! - `<% query.id.1 %>` - first group of the `id` query parameter pattern
//! - `<% header.x-trace.0 %>` - whole match of the `x-trace` header pattern
//! - `<% post.0.2 %>` - second group of the body regex
//!
//! # Example
//!
//! ```yaml
//! - request:
//!     url: ^/item/([0-9]+)$
//!   response:
//!     body: '{"id": <% url.0.1 %>}'
//! ```
//!
//! Tokens whose key was not captured are left in the output unchanged.

use crate::capture::CaptureStore;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Regex for matching render tokens: <% url.0.1 %>, <%query.id.2%>, etc.
static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_token_regex() -> &'static Regex {
    TOKEN_REGEX.get_or_init(|| Regex::new(r"<%\s*([A-Za-z0-9_.\-]+)\s*%>").unwrap())
}

/// Substitute every known token in `template` with its captured value.
pub fn render_tokens<'a>(template: &'a str, captures: &CaptureStore) -> Cow<'a, str> {
    if !has_tokens(template) {
        return Cow::Borrowed(template);
    }
    get_token_regex().replace_all(template, |caps: &regex::Captures| {
        match captures.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        }
    })
}

/// Check if a string contains render tokens
pub fn has_tokens(s: &str) -> bool {
    get_token_regex().is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures() -> CaptureStore {
        let mut store = CaptureStore::new();
        store.insert("url.0.0", "/item/42");
        store.insert("url.0.1", "42");
        store.insert("query.id.1", "7");
        store.insert("header.x-trace.1", "abc-123");
        store
    }

    #[test]
    fn test_render_url_capture() {
        assert_eq!(render_tokens("item <% url.0.1 %>", &captures()), "item 42");
    }

    #[test]
    fn test_render_without_whitespace() {
        assert_eq!(render_tokens("<%url.0.1%>", &captures()), "42");
    }

    #[test]
    fn test_render_multiple() {
        let result = render_tokens(
            r#"{"id": <% url.0.1 %>, "q": "<% query.id.1 %>", "t": "<% header.x-trace.1 %>"}"#,
            &captures(),
        );
        assert_eq!(result, r#"{"id": 42, "q": "7", "t": "abc-123"}"#);
    }

    #[test]
    fn test_unknown_token_left_verbatim() {
        assert_eq!(
            render_tokens("<% url.0.9 %> and <% url.0.1 %>", &captures()),
            "<% url.0.9 %> and 42"
        );
    }

    #[test]
    fn test_no_tokens_borrows() {
        let result = render_tokens("static", &captures());
        assert!(matches!(result, Cow::Borrowed("static")));
    }

    #[test]
    fn test_has_tokens() {
        assert!(has_tokens("<% url.0.1 %>"));
        assert!(has_tokens("files/<%query.id.1%>.json"));
        assert!(!has_tokens("no tokens here"));
        assert!(!has_tokens("<% %>"));
    }
}
