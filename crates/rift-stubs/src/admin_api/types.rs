//! Response types and helpers for the Admin API.

use crate::stubs::{ResourceStat, StubError};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;

pub const YAML_CONTENT_TYPE: &str = "application/x-yaml";

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

/// Individual error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Body of `GET /status`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub version: &'static str,
    pub stubs: usize,
    pub proxy_configs: usize,
    pub started_at: String,
    pub uptime_secs: u64,
    pub resources: Vec<ResourceStat>,
}

// =============================================================================
// Response helper functions
// =============================================================================

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Create a YAML response
pub fn yaml_response(status: StatusCode, yaml: String) -> Response<Full<Bytes>> {
    build_response_with_headers(status, [("Content-Type", YAML_CONTENT_TYPE)], yaml)
}

/// Build an HTTP response with the given status and body.
///
/// This function handles the unlikely case where Response::builder() fails
/// by returning a minimal 500 error response.
pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Build an HTTP response with headers.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Create an error response
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: status.as_str().to_string(),
            message: message.to_string(),
        }],
    };
    json_response(status, &error)
}

/// Create a not found response
pub fn not_found() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

pub fn method_not_allowed(message: &str) -> Response<Full<Bytes>> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, message)
}

/// Status code a repository error is reported with.
pub fn status_for(err: &StubError) -> StatusCode {
    match err {
        StubError::NoMatch { .. }
        | StubError::IndexOutOfRange(_)
        | StubError::UuidNotFound(_)
        | StubError::ProxyConfigNotFound(_) => StatusCode::NOT_FOUND,
        StubError::DefaultProxyConfigImmutable => StatusCode::METHOD_NOT_ALLOWED,
        StubError::MalformedDeclaredPattern { .. } | StubError::InvalidConfiguration(_) => {
            StatusCode::BAD_REQUEST
        }
    }
}

pub fn stub_error_response(err: &StubError) -> Response<Full<Bytes>> {
    error_response(status_for(err), &err.to_string())
}

/// Collect request body into bytes
pub async fn collect_body(req: Request<Incoming>) -> Result<Bytes, String> {
    use http_body_util::BodyExt;
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}

/// Collect a non-empty UTF-8 request body.
pub async fn collect_text_body(req: Request<Incoming>) -> Result<String, Response<Full<Bytes>>> {
    let body = collect_body(req)
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, &e))?;
    let text = String::from_utf8(body.to_vec())
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Request body is not valid UTF-8"))?;
    if text.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Request body must not be empty",
        ));
    }
    Ok(text)
}
