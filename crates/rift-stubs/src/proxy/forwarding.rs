//! Request forwarding to the upstream named by a proxy config, and recording
//! of response bodies from an upstream URL.

use crate::predicate::ObservedRequest;
use crate::stubs::{
    ProxyConfig, ProxyStrategy, RenderedResponse, PROXY_CONFIG_HEADER, PROXY_REQUEST_HEADER,
};
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Headers that describe the connection rather than the message.
const HOP_BY_HOP: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
];

/// Global HTTP client for proxy requests
static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn get_http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Upstream URL for `request`: the endpoint with the request's path and
/// query appended.
pub fn target_url(config: &ProxyConfig, request: &ObservedRequest) -> anyhow::Result<String> {
    let endpoint = config
        .endpoint()
        .with_context(|| format!("proxy config '{}' has no endpoint", config.uuid))?;
    Ok(format!(
        "{}{}",
        endpoint.trim_end_matches('/'),
        request.path_and_query()
    ))
}

/// Request headers that describe the message, minus the stubs' own
/// proxy-selection header.
fn request_headers(request: &ObservedRequest) -> BTreeMap<String, String> {
    request
        .headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(&name.as_str()) && *name != PROXY_CONFIG_HEADER)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Headers to send upstream. The config's headers are added only for the
/// additive strategy.
pub fn outbound_headers(config: &ProxyConfig, request: &ObservedRequest) -> BTreeMap<String, String> {
    let mut headers = request_headers(request);

    if config.strategy == ProxyStrategy::Additive {
        for (name, value) in &config.headers {
            headers.insert(name.to_lowercase(), value.clone());
        }
    }
    headers
}

/// Forward `request` upstream and collect the response. `round_trip` is sent
/// in the `x-stubby-proxy-request` header.
pub async fn forward(
    config: &ProxyConfig,
    request: &ObservedRequest,
    body: Bytes,
    round_trip: &str,
) -> anyhow::Result<RenderedResponse> {
    let target_url = target_url(config, request)?;
    debug!(
        "Proxy request to: {} (config '{}', {:?})",
        target_url, config.uuid, config.strategy
    );
    let mut headers = outbound_headers(config, request);
    headers.insert(PROXY_REQUEST_HEADER.to_string(), round_trip.to_string());
    exchange(&target_url, request, headers, body).await
}

/// Fetch the body a recording response replays: the request is repeated
/// against `source` with its path and query appended.
pub async fn record(
    source: &str,
    request: &ObservedRequest,
    body: Bytes,
) -> anyhow::Result<RenderedResponse> {
    let target_url = format!("{}{}", source.trim_end_matches('/'), request.path_and_query());
    debug!("Recording response from: {}", target_url);
    exchange(&target_url, request, request_headers(request), body).await
}

async fn exchange(
    target_url: &str,
    request: &ObservedRequest,
    headers: BTreeMap<String, String>,
    body: Bytes,
) -> anyhow::Result<RenderedResponse> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .with_context(|| format!("invalid method {}", request.method))?;

    let mut upstream = get_http_client().request(method, target_url);
    for (name, value) in headers {
        upstream = upstream.header(name, value);
    }
    if !body.is_empty() {
        upstream = upstream.body(body);
    }

    let response = upstream
        .send()
        .await
        .with_context(|| format!("Failed to send request to {}", target_url))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect();
    let body = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read response body from {}", target_url))?;

    Ok(RenderedResponse {
        status,
        headers,
        body,
        latency: None,
    })
}
