//! Router configuration for the gateway.
//!
//! This module defines the HTTP routes and applies middleware for CORS,
//! security response headers, the JSON request timeout and request tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                              - Health check
//! /layers                              - Layer catalog
//! /features                            - WFS feature query
//! /tiles/{layer}/{z}/{x}/{y}.pbf       - Vector tile stream
//! ```
//!
//! # Example
//!
//! ```ignore
//! use gis_gateway::config::GatewayConfig;
//! use gis_gateway::server::routes::{create_router, RouterConfig};
//! use gis_gateway::server::serve::{serve, ServeConfig};
//! use gis_gateway::upstream::{Credentials, GeoServerClient};
//!
//! let client = GeoServerClient::new(Credentials::new("admin", "pw"), timeout, 50)?;
//! let config = RouterConfig::new(GatewayConfig::new("http://localhost:8080/geoserver"))
//!     .with_cors_origins(vec!["http://localhost:5173".to_string()]);
//!
//! let router = create_router(client, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! serve(listener, router, ServeConfig::default(), shutdown_signal()).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{features_handler, health_handler, layers_handler, tile_handler, AppState};
use crate::config::GatewayConfig;
use crate::upstream::Upstream;

/// Headers added to every response unless a handler already set them.
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("x-dns-prefetch-control", "off"),
    ("x-permitted-cross-domain-policies", "none"),
    ("cross-origin-opener-policy", "same-origin"),
    ("content-security-policy", "default-src 'none'; frame-ancestors 'self'"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
];

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Settings shared with every handler
    pub gateway: GatewayConfig,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Whole-request timeout for the JSON routes (None = unbounded)
    pub request_timeout: Option<Duration>,
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default CORS allows any origin and tracing is enabled.
    pub fn new(gateway: GatewayConfig) -> Self {
        Self {
            gateway,
            cors_origins: None,
            enable_tracing: true,
            request_timeout: None,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Answer 408 when a JSON route takes longer than `timeout`.
    ///
    /// Tile streams are not covered; they are bounded by the upstream
    /// timeout and the stream idle timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `upstream` - Client for the upstream GeoServer
/// * `config` - Router configuration
pub fn create_router<U>(upstream: U, config: RouterConfig) -> Router
where
    U: Upstream + 'static,
{
    let cors = build_cors_layer(&config);
    let app_state = AppState::new(upstream, config.gateway);

    let json_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/layers", get(layers_handler::<U>))
        .route("/features", get(features_handler::<U>));

    // Router::layer only wraps routes registered so far, so the tile
    // route added afterwards stays outside the request timeout
    let json_routes = match config.request_timeout {
        Some(timeout) => json_routes.layer(request_timeout_layer(timeout)),
        None => json_routes,
    };

    // {filename} captures "{y}.pbf"; the handler checks the extension
    let router = json_routes
        .route("/tiles/{layer}/{z}/{x}/{filename}", get(tile_handler::<U>))
        .with_state(app_state)
        .layer(cors);
    let router = apply_security_headers(router);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

#[allow(deprecated)]
fn request_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::new(timeout)
}

fn apply_security_headers(router: Router) -> Router {
    SECURITY_HEADERS.iter().fold(router, |router, &(name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ))
    })
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
