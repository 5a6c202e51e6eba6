//! Proxy config handlers.

use crate::admin_api::server::AdminState;
use crate::admin_api::types::{
    build_response, collect_text_body, stub_error_response, yaml_response,
};
use crate::config::parse_single_proxy_config;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};

/// GET /proxy-config - Dump every proxy config
pub fn handle_list(state: &AdminState) -> Response<Full<Bytes>> {
    match state.repository.dump_proxy_configs() {
        Ok(yaml) => yaml_response(StatusCode::OK, yaml),
        Err(e) => stub_error_response(&e),
    }
}

/// GET /proxy-config/:uuid
pub fn handle_get(uuid: &str, state: &AdminState) -> Response<Full<Bytes>> {
    match state.repository.dump_proxy_config(uuid) {
        Ok(yaml) => yaml_response(StatusCode::OK, yaml),
        Err(e) => stub_error_response(&e),
    }
}

/// PUT /proxy-config/:uuid - Replace an existing proxy config
pub async fn handle_update(
    uuid: &str,
    req: Request<Incoming>,
    state: &AdminState,
) -> Response<Full<Bytes>> {
    let body = match collect_text_body(req).await {
        Ok(b) => b,
        Err(response) => return response,
    };

    let config = match parse_single_proxy_config(&body) {
        Ok(config) => config,
        Err(e) => return stub_error_response(&e),
    };

    match state.repository.update_proxy_config(uuid, config) {
        Ok(()) => build_response(
            StatusCode::CREATED,
            format!("Proxy config uuid#{uuid} updated successfully"),
        ),
        Err(e) => stub_error_response(&e),
    }
}

/// DELETE /proxy-config/:uuid
pub fn handle_delete(uuid: &str, state: &AdminState) -> Response<Full<Bytes>> {
    match state.repository.delete_proxy_config(uuid) {
        Ok(_) => build_response(
            StatusCode::OK,
            format!("Proxy config uuid#{uuid} deleted successfully"),
        ),
        Err(e) => stub_error_response(&e),
    }
}
