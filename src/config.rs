//! Configuration management for the GIS gateway.
//!
//! This module provides:
//! - Command-line arguments via clap
//! - Environment variables (also read from a `.env` file by the binary)
//! - Sensible defaults for all optional settings
//!
//! Configuration is read once at startup. [`Config::gateway_config`] turns
//! it into the immutable [`GatewayConfig`] shared by every request handler.
//!
//! # Environment Variables
//!
//! - `GATEWAY_HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 3000)
//! - `GEOSERVER_URL` - Upstream GeoServer base URL (required)
//! - `GEOSERVER_USER` / `GEOSERVER_PASSWORD` - Upstream basic-auth credentials
//! - `WORKSPACE` - Default GeoServer workspace (default: demo)
//! - `TILE_GRIDSET` - GeoWebCache gridset for tiles (default: EPSG:900913)
//! - `GEOM_COLUMN` - Geometry column used in BBOX filters (default: geom)
//! - `MAX_Z` - Maximum tile zoom level (default: 24)
//! - `ATTR_WHITELIST` - Comma-separated attribute keys allowed in filters
//! - `UPSTREAM_TIMEOUT_MS` - Upstream request timeout (default: 15000)
//! - `STREAM_TIMEOUT_MS` - Tile stream idle timeout (default: 20000)
//! - `UPSTREAM_POOL_SIZE` - Max concurrent upstream connections (default: 50)
//! - `HEADERS_TIMEOUT_MS` - Time a client has to send request headers (default: 15000)
//! - `REQUEST_TIMEOUT_MS` - Whole-request timeout for JSON routes (default: 60000)
//! - `CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::time::Duration;

use clap::Parser;

use crate::filter::AttributePolicy;
use crate::validate::{is_valid_identifier, MAX_SUPPORTED_ZOOM};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default GeoServer workspace.
pub const DEFAULT_WORKSPACE: &str = "demo";

/// Default GeoWebCache gridset (web mercator).
pub const DEFAULT_TILE_GRIDSET: &str = "EPSG:900913";

/// Default geometry column.
pub const DEFAULT_GEOM_COLUMN: &str = "geom";

/// Default maximum zoom level.
pub const DEFAULT_MAX_Z: u32 = 24;

/// Default upstream request timeout in milliseconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 15_000;

/// Default tile stream idle timeout in milliseconds.
pub const DEFAULT_STREAM_TIMEOUT_MS: u64 = 20_000;

/// Default number of concurrent upstream connections.
pub const DEFAULT_POOL_SIZE: usize = 50;

/// Default client header read timeout in milliseconds.
pub const DEFAULT_HEADERS_TIMEOUT_MS: u64 = 15_000;

/// Default whole-request timeout for JSON routes in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// GIS Gateway - a validating proxy in front of GeoServer.
///
/// Serves WFS feature queries, the layer catalog and vector tiles to web
/// map clients. Every parameter is validated before it reaches GeoServer.
#[derive(Parser, Debug, Clone)]
#[command(name = "gis-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GATEWAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Milliseconds a client has to send complete request headers.
    #[arg(long, default_value_t = DEFAULT_HEADERS_TIMEOUT_MS, env = "HEADERS_TIMEOUT_MS")]
    pub headers_timeout_ms: u64,

    /// Whole-request timeout in milliseconds for /health, /layers and /features.
    ///
    /// Tile streams are bounded by the upstream and stream timeouts instead.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_MS, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Base URL of the GeoServer instance, e.g. http://localhost:8080/geoserver
    #[arg(long, env = "GEOSERVER_URL")]
    pub geoserver_url: String,

    /// GeoServer basic-auth user.
    #[arg(long, default_value = "", env = "GEOSERVER_USER")]
    pub geoserver_user: String,

    /// GeoServer basic-auth password.
    #[arg(long, default_value = "", env = "GEOSERVER_PASSWORD", hide_env_values = true)]
    pub geoserver_password: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Applies until GeoServer starts answering. JSON bodies must also
    /// arrive within it.
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_MS, env = "UPSTREAM_TIMEOUT_MS")]
    pub upstream_timeout_ms: u64,

    /// Maximum number of concurrent upstream connections.
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, env = "UPSTREAM_POOL_SIZE")]
    pub pool_size: usize,

    // =========================================================================
    // GeoServer Layout
    // =========================================================================
    /// Workspace used when a request does not name one.
    #[arg(long, default_value = DEFAULT_WORKSPACE, env = "WORKSPACE")]
    pub workspace: String,

    /// GeoWebCache gridset used in tile URLs.
    #[arg(long, default_value = DEFAULT_TILE_GRIDSET, env = "TILE_GRIDSET")]
    pub tile_gridset: String,

    /// Geometry column used for the BBOX predicate.
    #[arg(long, default_value = DEFAULT_GEOM_COLUMN, env = "GEOM_COLUMN")]
    pub geom_column: String,

    // =========================================================================
    // Request Limits
    // =========================================================================
    /// Maximum tile zoom level.
    #[arg(long, default_value_t = DEFAULT_MAX_Z, env = "MAX_Z")]
    pub max_z: u32,

    /// Attribute keys allowed as feature filters (comma-separated).
    ///
    /// If empty, any key matching [A-Za-z0-9_]+ is allowed.
    #[arg(long, env = "ATTR_WHITELIST", value_delimiter = ',')]
    pub attr_whitelist: Vec<String>,

    /// Tile stream idle timeout in milliseconds.
    ///
    /// A tile transfer that produces no bytes for this long is aborted.
    #[arg(long, default_value_t = DEFAULT_STREAM_TIMEOUT_MS, env = "STREAM_TIMEOUT_MS")]
    pub stream_timeout_ms: u64,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let url = self.geoserver_url.trim();
        if url.is_empty() {
            return Err("GeoServer URL is required. Set --geoserver-url or GEOSERVER_URL".to_string());
        }
        match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                return Err(format!(
                    "GeoServer URL must be an http(s) URL, got '{}'",
                    self.geoserver_url
                ))
            }
        }

        if !is_valid_identifier(&self.workspace) {
            return Err(format!(
                "workspace '{}' must match [A-Za-z0-9_]+",
                self.workspace
            ));
        }
        if !is_valid_identifier(&self.geom_column) {
            return Err(format!(
                "geom_column '{}' must match [A-Za-z0-9_]+",
                self.geom_column
            ));
        }
        if self.tile_gridset.trim().is_empty() || self.tile_gridset.contains(&['/', '?', '#', '@'][..]) {
            return Err(format!("tile_gridset '{}' is not a gridset name", self.tile_gridset));
        }

        if self.max_z > MAX_SUPPORTED_ZOOM {
            return Err(format!("max_z must be between 0 and {}", MAX_SUPPORTED_ZOOM));
        }

        if let Some(bad) = self
            .whitelist_entries()
            .into_iter()
            .find(|key| !is_valid_identifier(key))
        {
            return Err(format!("attr_whitelist entry '{}' must match [A-Za-z0-9_]+", bad));
        }

        if self.upstream_timeout_ms == 0 {
            return Err("upstream_timeout_ms must be greater than 0".to_string());
        }
        if self.stream_timeout_ms == 0 {
            return Err("stream_timeout_ms must be greater than 0".to_string());
        }
        if self.pool_size == 0 {
            return Err("pool_size must be greater than 0".to_string());
        }
        if self.headers_timeout_ms == 0 {
            return Err("headers_timeout_ms must be greater than 0".to_string());
        }
        if self.request_timeout_ms < self.upstream_timeout_ms {
            return Err(format!(
                "request_timeout_ms ({}) must be at least upstream_timeout_ms ({})",
                self.request_timeout_ms, self.upstream_timeout_ms
            ));
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }

    pub fn headers_timeout(&self) -> Duration {
        Duration::from_millis(self.headers_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Whitelist entries with whitespace trimmed and blanks removed.
    fn whitelist_entries(&self) -> Vec<String> {
        self.attr_whitelist
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Build the read-only settings handed to request handlers.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            geoserver_url: self.geoserver_url.trim().trim_end_matches('/').to_string(),
            workspace: self.workspace.clone(),
            tile_gridset: self.tile_gridset.clone(),
            geom_column: self.geom_column.clone(),
            max_z: self.max_z,
            attributes: AttributePolicy::with_whitelist(self.whitelist_entries()),
            stream_timeout: self.stream_timeout(),
        }
    }
}

// =============================================================================
// Gateway Configuration
// =============================================================================

/// Immutable per-process settings used by the request handlers.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// GeoServer base URL without a trailing slash
    pub geoserver_url: String,

    /// Default workspace
    pub workspace: String,

    /// GeoWebCache gridset for tile URLs
    pub tile_gridset: String,

    /// Geometry column for BBOX predicates
    pub geom_column: String,

    /// Highest zoom level served
    pub max_z: u32,

    /// Admission policy for attribute filters
    pub attributes: AttributePolicy,

    /// Idle timeout for streamed tile bodies
    pub stream_timeout: Duration,
}

impl GatewayConfig {
    /// Settings with defaults for everything but the upstream URL.
    pub fn new(geoserver_url: impl Into<String>) -> Self {
        let url: String = geoserver_url.into();
        Self {
            geoserver_url: url.trim_end_matches('/').to_string(),
            workspace: DEFAULT_WORKSPACE.to_string(),
            tile_gridset: DEFAULT_TILE_GRIDSET.to_string(),
            geom_column: DEFAULT_GEOM_COLUMN.to_string(),
            max_z: DEFAULT_MAX_Z,
            attributes: AttributePolicy::open(),
            stream_timeout: Duration::from_millis(DEFAULT_STREAM_TIMEOUT_MS),
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_max_z(mut self, max_z: u32) -> Self {
        self.max_z = max_z;
        self
    }

    pub fn with_attr_whitelist(mut self, keys: Vec<String>) -> Self {
        self.attributes = AttributePolicy::with_whitelist(keys);
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
