//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers::{proxy_configs, stubs, system};
use crate::admin_api::server::AdminState;
use crate::admin_api::types::{method_not_allowed, not_found};
use crate::stubs::StubSelector;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::sync::Arc;
use tracing::debug;

/// Parsed admin route
#[derive(Debug, PartialEq)]
enum AdminRoute {
    /// GET/POST/PUT/DELETE /
    Root,
    /// GET /health
    Health,
    /// GET /status
    Status,
    /// GET /proxy-config
    ProxyConfigs,
    /// GET/PUT/DELETE /proxy-config/:uuid
    ProxyConfig(String),
    /// GET/PUT/DELETE /:index or /:uuid
    Stub(StubSelector),
}

impl AdminRoute {
    fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::decode(s).map(|d| d.into_owned()))
            .collect::<Result<_, _>>()
            .ok()?;
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match segments.as_slice() {
            [] => Some(AdminRoute::Root),
            ["health"] => Some(AdminRoute::Health),
            ["status"] => Some(AdminRoute::Status),
            ["proxy-config"] => Some(AdminRoute::ProxyConfigs),
            ["proxy-config", uuid] => Some(AdminRoute::ProxyConfig(uuid.to_string())),
            [selector] => Some(AdminRoute::Stub(StubSelector::parse(selector))),
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    state: Arc<AdminState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Admin API: {} {}", method, path);

    let Some(route) = AdminRoute::parse(&path) else {
        return Ok(not_found());
    };

    let response = match (&method, route) {
        (&Method::GET, AdminRoute::Root) => stubs::handle_dump_all(&state),
        (&Method::POST, AdminRoute::Root) => stubs::handle_replace_all(req, &state).await,
        (&Method::PUT, AdminRoute::Root) => {
            method_not_allowed("Use PUT /{index} or PUT /{uuid} to update a single stub")
        }
        (&Method::DELETE, AdminRoute::Root) => stubs::handle_delete_all(&state),

        (&Method::GET, AdminRoute::Health) => system::handle_health(),
        (&Method::GET, AdminRoute::Status) => system::handle_status(&state),

        (&Method::GET, AdminRoute::ProxyConfigs) => proxy_configs::handle_list(&state),
        (&Method::GET, AdminRoute::ProxyConfig(uuid)) => proxy_configs::handle_get(&uuid, &state),
        (&Method::PUT, AdminRoute::ProxyConfig(uuid)) => {
            proxy_configs::handle_update(&uuid, req, &state).await
        }
        (&Method::DELETE, AdminRoute::ProxyConfig(uuid)) => {
            proxy_configs::handle_delete(&uuid, &state)
        }

        (&Method::GET, AdminRoute::Stub(selector)) => stubs::handle_dump(&selector, &state),
        (&Method::PUT, AdminRoute::Stub(selector)) => {
            stubs::handle_update(&selector, req, &state).await
        }
        (&Method::DELETE, AdminRoute::Stub(selector)) => stubs::handle_delete(&selector, &state),

        _ => not_found(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_route_parse() {
        assert_eq!(AdminRoute::parse("/"), Some(AdminRoute::Root));
        assert_eq!(AdminRoute::parse(""), Some(AdminRoute::Root));
        assert_eq!(AdminRoute::parse("/health"), Some(AdminRoute::Health));
        assert_eq!(AdminRoute::parse("/status"), Some(AdminRoute::Status));
        assert_eq!(
            AdminRoute::parse("/proxy-config"),
            Some(AdminRoute::ProxyConfigs)
        );
        assert_eq!(
            AdminRoute::parse("/proxy-config/default"),
            Some(AdminRoute::ProxyConfig("default".to_string()))
        );
        assert_eq!(
            AdminRoute::parse("/3"),
            Some(AdminRoute::Stub(StubSelector::Index(3)))
        );
        assert_eq!(
            AdminRoute::parse("/item-stub"),
            Some(AdminRoute::Stub(StubSelector::Uuid("item-stub".to_string())))
        );
        assert_eq!(
            AdminRoute::parse("/my%20stub"),
            Some(AdminRoute::Stub(StubSelector::Uuid("my stub".to_string())))
        );

        // Invalid routes
        assert!(AdminRoute::parse("/a/b").is_none());
        assert!(AdminRoute::parse("/proxy-config/a/b").is_none());
    }
}
