//! Compiled responses and their rendering.

use super::types::{RenderedResponse, ResponsePattern, StubError};
use crate::capture::CaptureStore;
use crate::template::{has_tokens, render_tokens};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

const DEFAULT_STATUS: u16 = 200;

#[derive(Debug, Clone)]
enum ResponseBody {
    Inline(String),
    /// File contents read at load time.
    File(Bytes),
    /// File path holding tokens; read at render time.
    TokenizedFile { path: String, base_dir: PathBuf },
}

/// An inline body that names an upstream URL. The first request served by
/// the response fetches the body from there; later requests replay it.
#[derive(Debug, Clone)]
pub struct Recording {
    source: String,
    recorded: Arc<OnceLock<Bytes>>,
}

impl Recording {
    fn detect(body: &str) -> Option<Self> {
        let lower = body.trim().to_ascii_lowercase();
        (lower.starts_with("http://") || lower.starts_with("https://")).then(|| Self {
            source: body.trim().to_string(),
            recorded: Arc::new(OnceLock::new()),
        })
    }

    /// Base URL the request path is appended to.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn recorded(&self) -> Option<Bytes> {
        self.recorded.get().cloned()
    }

    /// Keep `body` as the recorded body and return whatever is now recorded.
    /// The first stored body wins when requests race.
    pub fn store(&self, body: Bytes) -> Bytes {
        match self.recorded.set(body) {
            Ok(()) => self.recorded.get().cloned().unwrap_or_default(),
            Err(body) => self.recorded.get().cloned().unwrap_or(body),
        }
    }
}

/// A declared response, validated and with its body resolved.
#[derive(Debug, Clone)]
pub struct StubResponse {
    pattern: ResponsePattern,
    body: ResponseBody,
    recording: Option<Recording>,
}

impl StubResponse {
    pub fn compile(pattern: ResponsePattern, base_dir: &Path) -> Result<Self, StubError> {
        if let Some(status) = &pattern.status {
            if !has_tokens(status) {
                parse_status(status).ok_or_else(|| StubError::MalformedDeclaredPattern {
                    field: "response.status".to_string(),
                    reason: format!("'{status}' is not a valid HTTP status code"),
                })?;
            }
        }

        let body = match &pattern.file {
            Some(path) if has_tokens(path) => ResponseBody::TokenizedFile {
                path: path.clone(),
                base_dir: base_dir.to_path_buf(),
            },
            Some(path) => {
                let full = base_dir.join(path);
                let contents = std::fs::read(&full).map_err(|e| {
                    StubError::InvalidConfiguration(format!(
                        "cannot read response file {}: {}",
                        full.display(),
                        e
                    ))
                })?;
                ResponseBody::File(Bytes::from(contents))
            }
            None => ResponseBody::Inline(pattern.body.clone().unwrap_or_default()),
        };

        let recording = match &body {
            ResponseBody::Inline(text) => Recording::detect(text),
            _ => None,
        };

        Ok(Self {
            pattern,
            body,
            recording,
        })
    }

    pub fn pattern(&self) -> &ResponsePattern {
        &self.pattern
    }

    /// The recording this response still has to make, if any.
    pub fn pending_recording(&self) -> Option<&Recording> {
        self.recording
            .as_ref()
            .filter(|recording| recording.recorded().is_none())
    }

    /// Render status, headers and body against the request's captures.
    pub fn render(&self, captures: &CaptureStore) -> RenderedResponse {
        let status = match &self.pattern.status {
            Some(declared) => {
                let rendered = render_tokens(declared, captures);
                parse_status(&rendered).unwrap_or_else(|| {
                    warn!("Rendered status '{}' is not a valid status code, using 500", rendered);
                    500
                })
            }
            None => DEFAULT_STATUS,
        };

        let headers = self
            .pattern
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), render_tokens(value, captures).into_owned()))
            .collect();

        let body = match self.recording.as_ref().and_then(Recording::recorded) {
            Some(recorded) => recorded,
            None => self.render_body(captures),
        };

        RenderedResponse {
            status,
            headers,
            body,
            latency: self.pattern.latency.map(Duration::from_millis),
        }
    }

    fn render_body(&self, captures: &CaptureStore) -> Bytes {
        match &self.body {
            ResponseBody::Inline(text) => Bytes::from(render_tokens(text, captures).into_owned()),
            ResponseBody::File(contents) => contents.clone(),
            ResponseBody::TokenizedFile { path, base_dir } => {
                let full = base_dir.join(render_tokens(path, captures).as_ref());
                match std::fs::read(&full) {
                    Ok(contents) => Bytes::from(contents),
                    Err(e) => {
                        warn!(
                            "Cannot read response file {}: {}, falling back to inline body",
                            full.display(),
                            e
                        );
                        let inline = self.pattern.body.as_deref().unwrap_or_default();
                        Bytes::from(render_tokens(inline, captures).into_owned())
                    }
                }
            }
        }
    }
}

fn parse_status(text: &str) -> Option<u16> {
    text.trim()
        .parse::<u16>()
        .ok()
        .filter(|code| (100..=599).contains(code))
}
