//! Stubs portal request handling.

use crate::auth::AuthOutcome;
use crate::predicate::ObservedRequest;
use crate::proxy;
use crate::stubs::{
    Lookup, RenderedResponse, StubRepository, PROXY_RESPONSE_HEADER, RESOURCE_ID_HEADER,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Convert an incoming hyper request into the matcher's view of it.
pub fn observe(parts: &hyper::http::request::Parts, body: &Bytes) -> ObservedRequest {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let mut request = ObservedRequest::new(parts.method.as_str(), path_and_query);
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.as_str().to_lowercase(), value.to_string());
        }
    }
    if !body.is_empty() {
        request.body = Some(String::from_utf8_lossy(body).into_owned());
    }
    request
}

/// Serve one request from the repository.
pub async fn handle_request(
    req: Request<Incoming>,
    repository: Arc<StubRepository>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    let request = observe(&parts, &body);

    debug!("Portal: {} {}", request.method, request.path_and_query());

    let response = match repository.find_match(&request) {
        Lookup::Found(mut hit) => {
            if let Some(recording) = hit.recording.take() {
                match proxy::record(recording.source(), &request, body).await {
                    Ok(upstream) => hit.response.body = recording.store(upstream.body),
                    Err(e) => error!("Could not record from {}: {:#}", recording.source(), e),
                }
            }
            if let Some(latency) = hit.response.latency {
                tokio::time::sleep(latency).await;
            }
            let mut response = into_response(hit.response);
            if let Ok(value) = HeaderValue::from_str(&hit.rank.to_string()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(RESOURCE_ID_HEADER), value);
            }
            response
        }
        Lookup::Unauthorized { rank, outcome } => {
            debug!("Stub {} refused {} {}", rank, request.method, request.path);
            let message = match outcome {
                AuthOutcome::Missing => "Missing 'Authorization' header",
                _ => "The 'Authorization' header does not match the expected credentials",
            };
            text_response(StatusCode::UNAUTHORIZED, message)
        }
        Lookup::Proxy(config) => {
            let round_trip = Uuid::new_v4().to_string();
            let mut response = match proxy::forward(&config, &request, body, &round_trip).await {
                Ok(upstream) => into_response(upstream),
                Err(e) => {
                    error!("Proxy config '{}' failed: {:#}", config.uuid, e);
                    text_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}"))
                }
            };
            if let Ok(value) = HeaderValue::from_str(&round_trip) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(PROXY_RESPONSE_HEADER), value);
            }
            response
        }
        Lookup::NotFound(err) => {
            debug!("{}", err);
            text_response(StatusCode::NOT_FOUND, &err.to_string())
        }
    };
    Ok(response)
}

/// Build a hyper response. Header names or values that are not valid HTTP
/// are dropped.
pub fn into_response(rendered: RenderedResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(rendered.body));
    *response.status_mut() =
        StatusCode::from_u16(rendered.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let headers = response.headers_mut();
    for (name, value) in rendered.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!("Dropping invalid response header '{}'", name),
        }
    }
    response
}

fn text_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_observe_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/orders?id=5")
            .header("Content-Type", "application/json")
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        let observed = observe(&parts, &Bytes::from_static(b"{\"a\":1}"));

        assert_eq!(observed.method, "POST");
        assert_eq!(observed.path, "/orders");
        assert_eq!(observed.query["id"], "5");
        assert_eq!(observed.content_type(), Some("application/json"));
        assert_eq!(observed.body.as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_observe_empty_body() {
        let (parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        assert!(observe(&parts, &Bytes::new()).body.is_none());
    }

    #[test]
    fn test_into_response_drops_invalid_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("x-ok".to_string(), "yes".to_string());
        headers.insert("bad header".to_string(), "no".to_string());
        let response = into_response(RenderedResponse {
            status: 201,
            headers,
            body: Bytes::from("created"),
            latency: None,
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-ok").unwrap(), "yes");
        assert_eq!(response.headers().len(), 1);
    }
}
