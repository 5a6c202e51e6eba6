//! A compiled stub: request pattern, response sequence and runtime counters.

use super::cycler::SequenceCursor;
use super::response::StubResponse;
use super::types::{ResponsePattern, StubDeclaration, StubError};
use crate::capture::CaptureStore;
use crate::predicate::{CompiledRequestPattern, ObservedRequest};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Runtime state of a stub.
///
/// Entries are shared between repository snapshots as `Arc<StubEntry>`, so an
/// entry that survives a mutation keeps its cursor and hit count.
pub struct StubEntry {
    uuid: Option<String>,
    description: Option<String>,
    request: CompiledRequestPattern,
    /// Never empty.
    responses: Vec<StubResponse>,
    cursor: SequenceCursor,
    hits: AtomicU64,
}

impl StubEntry {
    /// Compile a declaration. Relative body files resolve against `base_dir`.
    pub fn compile(declaration: StubDeclaration, base_dir: &Path) -> Result<Self, StubError> {
        let StubDeclaration {
            description,
            uuid,
            request,
            response,
        } = declaration;

        if uuid.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(StubError::InvalidConfiguration(
                "stub uuid must not be empty".to_string(),
            ));
        }

        let request = CompiledRequestPattern::compile(request, base_dir)?;

        let declared = if response.is_empty() {
            vec![ResponsePattern::new()]
        } else {
            response
        };
        let responses = declared
            .into_iter()
            .map(|pattern| StubResponse::compile(pattern, base_dir))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            uuid,
            description,
            request,
            responses,
            cursor: SequenceCursor::new(),
            hits: AtomicU64::new(0),
        })
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn request(&self) -> &CompiledRequestPattern {
        &self.request
    }

    pub fn responses(&self) -> &[StubResponse] {
        &self.responses
    }

    pub fn matches(&self, request: &ObservedRequest, captures: &mut CaptureStore) -> bool {
        self.request.matches(request, captures)
    }

    /// Hand out the next response of the sequence.
    pub fn next_response(&self) -> &StubResponse {
        let index = self.cursor.advance(self.responses.len());
        &self.responses[index]
    }

    /// Index of the response the next call to `next_response` returns.
    pub fn cursor_position(&self) -> usize {
        self.cursor.peek(self.responses.len())
    }

    pub fn reset_cursor(&self) {
        self.cursor.reset();
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Rebuild the declaration this entry was compiled from.
    pub fn to_declaration(&self) -> StubDeclaration {
        StubDeclaration {
            description: self.description.clone(),
            uuid: self.uuid.clone(),
            request: self.request.pattern().clone(),
            response: self
                .responses
                .iter()
                .map(|r| r.pattern().clone())
                .collect(),
        }
    }
}

impl fmt::Debug for StubEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StubEntry")
            .field("uuid", &self.uuid)
            .field("url", &self.request.url())
            .field("responses", &self.responses.len())
            .field("cursor", &self.cursor)
            .field("hits", &self.hits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::RequestPattern;
    use bytes::Bytes;

    fn entry(bodies: &[&str]) -> StubEntry {
        let mut declaration = StubDeclaration::new(RequestPattern::new().with_url("^/seq$"));
        for body in bodies {
            declaration = declaration.with_response(ResponsePattern::new().with_body(*body));
        }
        StubEntry::compile(declaration, Path::new(".")).unwrap()
    }

    #[test]
    fn test_sequence_cycles_in_order() {
        let stub = entry(&["A", "B", "C"]);
        let captures = CaptureStore::new();
        let bodies: Vec<Bytes> = (0..4)
            .map(|_| stub.next_response().render(&captures).body)
            .collect();
        assert_eq!(bodies, vec!["A", "B", "C", "A"]);
    }

    #[test]
    fn test_missing_response_defaults_to_200() {
        let stub = entry(&[]);
        assert_eq!(stub.responses().len(), 1);
        assert_eq!(stub.next_response().render(&CaptureStore::new()).status, 200);
        assert!(stub.to_declaration().response.len() == 1);
    }

    #[test]
    fn test_reset_cursor() {
        let stub = entry(&["A", "B"]);
        let _ = stub.next_response();
        assert_eq!(stub.cursor_position(), 1);
        stub.reset_cursor();
        assert_eq!(stub.cursor_position(), 0);
    }

    #[test]
    fn test_hits_and_declaration() {
        let declaration = StubDeclaration::new(RequestPattern::new().with_url("^/x$"))
            .with_uuid("x-stub")
            .with_description("the x stub")
            .with_response(ResponsePattern::new().with_status("204"));
        let stub = StubEntry::compile(declaration.clone(), Path::new(".")).unwrap();

        stub.record_hit();
        stub.record_hit();
        assert_eq!(stub.hits(), 2);
        assert_eq!(stub.uuid(), Some("x-stub"));
        assert_eq!(stub.to_declaration(), declaration);
    }

    #[test]
    fn test_blank_uuid_rejected() {
        let declaration = StubDeclaration::new(RequestPattern::new()).with_uuid("  ");
        assert!(matches!(
            StubEntry::compile(declaration, Path::new(".")),
            Err(StubError::InvalidConfiguration(_))
        ));
    }
}
