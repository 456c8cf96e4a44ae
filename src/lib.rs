//! # GIS Gateway
//!
//! A validating HTTP gateway in front of a GeoServer instance.
//!
//! Browser clients never talk to GeoServer directly. Every request is
//! checked here first: layer and workspace names are restricted to safe
//! identifiers, bounding boxes and tile coordinates are range-checked, and
//! attribute filters are rebuilt as escaped CQL. Only then is the request
//! forwarded to GeoServer with the gateway's own credentials.
//!
//! ## Features
//!
//! - **Feature queries**: `/features` turns a bbox plus attribute filters into a WFS GetFeature call
//! - **Layer catalog**: `/layers` relays the GeoServer REST layer listing
//! - **Vector tiles**: `/tiles/{layer}/{z}/{x}/{y}.pbf` streams GeoWebCache tiles without buffering
//! - **Pooled upstream**: a bounded, keep-alive connection pool with per-request timeouts
//!
//! ## Architecture
//!
//! - [`validate`] - Identifier, bbox, limit and tile coordinate validation
//! - [`filter`] - CQL filter construction with literal escaping
//! - [`upstream`] - GeoServer client, URL builders and the tile body pump
//! - [`server`] - Axum-based HTTP handlers, routes and the accept loop
//! - [`config`] - CLI and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use gis_gateway::{
//!     create_router, serve, Credentials, GatewayConfig, GeoServerClient, RouterConfig, ServeConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = GeoServerClient::new(
//!         Credentials::new("admin", "geoserver"),
//!         Duration::from_secs(15),
//!         50,
//!     )
//!     .unwrap();
//!
//!     let config = RouterConfig::new(GatewayConfig::new("http://localhost:8080/geoserver"));
//!     let router = create_router(client, config);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     serve(listener, router, ServeConfig::default(), std::future::pending())
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod server;
pub mod upstream;
pub mod validate;

// Re-export commonly used types
pub use config::{Config, GatewayConfig};
pub use error::{GatewayError, UpstreamError, ValidationError};
pub use filter::{build_filter, escape_literal, AttributePolicy, FilterExpression};
pub use server::{
    create_router, features_handler, health_handler, layers_handler, tile_handler, AppState,
    serve, ErrorResponse, HealthResponse, RouterConfig, ServeConfig, TilePathParams,
    SECURITY_HEADERS,
};
pub use upstream::{
    layers_url, pump_body, tile_url, wfs_url, ByteStream, Credentials, GeoServerClient,
    PassthroughHeaders, Relay, Upstream, WfsQuery,
};
pub use validate::{
    is_valid_identifier, parse_bbox, parse_limit, validate_tile, BoundingBox, TileCoordinate,
};
