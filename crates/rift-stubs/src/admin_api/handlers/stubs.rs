//! Stub management handlers.

use crate::admin_api::server::AdminState;
use crate::admin_api::types::{
    build_response, build_response_with_headers, collect_text_body, stub_error_response,
    yaml_response,
};
use crate::config::{parse_single_stub, StubsConfig};
use crate::stubs::StubSelector;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::{info, warn};

/// GET / - Dump every proxy config and stub as YAML
pub fn handle_dump_all(state: &AdminState) -> Response<Full<Bytes>> {
    match state.repository.dump_all() {
        Ok(yaml) => yaml_response(StatusCode::OK, yaml),
        Err(e) => stub_error_response(&e),
    }
}

/// GET /:index or /:uuid - Dump one stub as YAML
pub fn handle_dump(selector: &StubSelector, state: &AdminState) -> Response<Full<Bytes>> {
    match state.repository.dump(selector) {
        Ok(yaml) => yaml_response(StatusCode::OK, yaml),
        Err(e) => stub_error_response(&e),
    }
}

/// POST / - Replace the whole configuration
pub async fn handle_replace_all(req: Request<Incoming>, state: &AdminState) -> Response<Full<Bytes>> {
    let body = match collect_text_body(req).await {
        Ok(b) => b,
        Err(response) => return response,
    };

    let config = match StubsConfig::from_yaml(&body, &state.base_dir) {
        Ok(config) => config,
        Err(e) => {
            warn!("Rejected posted configuration: {}", e);
            return stub_error_response(&e);
        }
    };

    let count = config.entries.len();
    config.install(&state.repository);
    info!("Configuration replaced through the admin API ({} stubs)", count);
    build_response(
        StatusCode::CREATED,
        format!("Configuration created successfully with {count} stubs"),
    )
}

/// PUT /:index or /:uuid - Replace one stub
pub async fn handle_update(
    selector: &StubSelector,
    req: Request<Incoming>,
    state: &AdminState,
) -> Response<Full<Bytes>> {
    let body = match collect_text_body(req).await {
        Ok(b) => b,
        Err(response) => return response,
    };

    let entry = match parse_single_stub(&body, &state.base_dir) {
        Ok(entry) => entry,
        Err(e) => return stub_error_response(&e),
    };

    match state.repository.update(selector, entry) {
        Ok(rank) => {
            let location = match selector {
                StubSelector::Index(index) => format!("/{index}"),
                StubSelector::Uuid(uuid) => format!("/{}", urlencoding::encode(uuid)),
            };
            build_response_with_headers(
                StatusCode::CREATED,
                [("Location", location.as_str())],
                format!("Stub request index#{rank} updated successfully"),
            )
        }
        Err(e) => stub_error_response(&e),
    }
}

/// DELETE / - Remove every stub and proxy config
pub fn handle_delete_all(state: &AdminState) -> Response<Full<Bytes>> {
    state.repository.clear();
    build_response(StatusCode::OK, "All stubs and proxy configs deleted successfully")
}

/// DELETE /:index or /:uuid - Remove one stub
pub fn handle_delete(selector: &StubSelector, state: &AdminState) -> Response<Full<Bytes>> {
    match state.repository.delete(selector) {
        Ok(_) => build_response(StatusCode::OK, "Stub deleted successfully"),
        Err(e) => stub_error_response(&e),
    }
}
