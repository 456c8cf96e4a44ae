//! HTTP request handlers for the gateway API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /layers` - GeoServer layer catalog
//! - `GET /features` - WFS feature query with BBOX and attribute filters
//! - `GET /tiles/{layer}/{z}/{x}/{y}.pbf` - Streamed vector tile
//!
//! Every handler validates its input before touching the upstream, so a
//! rejected request never costs GeoServer any work.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, ValidationError};
use crate::filter::build_filter;
use crate::upstream::{
    layers_url, pump_body, tile_url, wfs_url, PassthroughHeaders, Relay, Upstream,
    WfsQuery,
};
use crate::validate::{is_valid_identifier, parse_bbox, parse_limit, validate_tile};

/// Cache-Control sent with successful feature responses.
pub const FEATURES_CACHE_CONTROL: &str = "public, max-age=15";

/// Cache-Control sent with successful tiles. A tile at fixed z/x/y never changes.
pub const TILE_CACHE_CONTROL: &str = "public, max-age=3600";

/// Accept header sent when fetching tiles.
pub const TILE_ACCEPT: &str = "application/x-protobuf";

const WFS_FAILED: &str = "Upstream WFS failed";
const WFS_INVALID_JSON: &str = "Upstream WFS returned invalid JSON";
const REST_FAILED: &str = "Upstream REST failed";
const TILE_FAILED: &str = "Upstream tile fetch failed";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state: the upstream client and read-only settings.
///
/// Built once at startup and handed to every handler through Axum's
/// State extractor. Nothing in it is mutated after construction.
pub struct AppState<U: Upstream> {
    /// Client for the upstream GeoServer
    pub upstream: Arc<U>,

    /// Read-only gateway settings
    pub config: Arc<GatewayConfig>,
}

impl<U: Upstream> AppState<U> {
    pub fn new(upstream: U, config: GatewayConfig) -> Self {
        Self {
            upstream: Arc::new(upstream),
            config: Arc::new(config),
        }
    }
}

impl<U: Upstream> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            config: Arc::clone(&self.config),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/tiles/{layer}/{z}/{x}/{filename}` where filename is
/// `{y}.pbf`. Kept as strings so validation owns every error message.
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    pub layer: String,
    pub z: String,
    pub x: String,
    pub filename: String,
}

impl TilePathParams {
    /// The row index with its `.pbf` extension removed.
    pub fn y(&self) -> Result<&str, ValidationError> {
        self.filename
            .strip_suffix(".pbf")
            .ok_or(ValidationError::TileExtension)
    }
}

/// Query parameters of a feature request.
///
/// `bbox`, `layer`, `workspace` and `limit` are reserved; every other
/// parameter is a candidate attribute filter, kept in the order received.
/// A parameter given more than once is treated as absent.
#[derive(Debug, Default, PartialEq)]
pub struct FeatureParams {
    pub bbox: Option<String>,
    pub layer: Option<String>,
    pub workspace: Option<String>,
    pub limit: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl FeatureParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut seen: Vec<(String, Option<String>)> = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match seen.iter_mut().find(|(k, _)| *k == key) {
                Some((_, slot)) => *slot = None,
                None => seen.push((key, Some(value))),
            }
        }

        let mut params = FeatureParams::default();
        for (key, value) in seen {
            match key.as_str() {
                "bbox" => params.bbox = value,
                "layer" => params.layer = value,
                "workspace" => params.workspace = value,
                "limit" => params.limit = value,
                _ => {
                    if let Some(value) = value {
                        params.attributes.push((key, value));
                    } else {
                        debug!(key = %key, "Dropping repeated attribute parameter");
                    }
                }
            }
        }
        params
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,

    /// Current server time, RFC 3339 in UTC
    pub time: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

impl GatewayError {
    /// Status for this error, logging it by severity.
    ///
    /// Client errors are logged at WARN, upstream failures at ERROR with
    /// their full detail. Only [`GatewayError::client_message`] goes back
    /// to the client.
    fn status_logged(&self) -> StatusCode {
        if self.is_client_error() {
            warn!(status = 400, "Client error: {}", self);
            StatusCode::BAD_REQUEST
        } else {
            error!(status = 502, "Upstream error: {}", self);
            StatusCode::BAD_GATEWAY
        }
    }
}

/// Error rendered as `{"error": "..."}`. Used by the JSON endpoints.
#[derive(Debug)]
pub struct JsonError(pub GatewayError);

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let status = self.0.status_logged();
        (status, Json(ErrorResponse::new(self.0.client_message()))).into_response()
    }
}

impl From<GatewayError> for JsonError {
    fn from(err: GatewayError) -> Self {
        JsonError(err)
    }
}

impl From<ValidationError> for JsonError {
    fn from(err: ValidationError) -> Self {
        JsonError(err.into())
    }
}

/// Error rendered as plain text. Used by the tile endpoint.
#[derive(Debug)]
pub struct TextError(pub GatewayError);

impl IntoResponse for TextError {
    fn into_response(self) -> Response {
        let status = self.0.status_logged();
        (status, self.0.client_message()).into_response()
    }
}

impl From<GatewayError> for TextError {
    fn from(err: GatewayError) -> Self {
        TextError(err)
    }
}

impl From<ValidationError> for TextError {
    fn from(err: ValidationError) -> Self {
        TextError(err.into())
    }
}

/// Build a response carrying the upstream status, passthrough headers and body.
fn relay_response(status: StatusCode, headers: &PassthroughHeaders, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Some(ref content_type) = headers.content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type.clone());
    }
    if let Some(ref content_encoding) = headers.content_encoding {
        response
            .headers_mut()
            .insert(header::CONTENT_ENCODING, content_encoding.clone());
    }
    response
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with `{"ok": true, "time": "2024-01-01T00:00:00.000Z"}`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Handle layer catalog requests.
///
/// # Endpoint
///
/// `GET /layers`
///
/// # Response
///
/// The upstream status, content type and body, unchanged.
///
/// # Errors
///
/// - `502 Bad Gateway`: GeoServer unreachable or timed out
pub async fn layers_handler<U: Upstream>(
    State(state): State<AppState<U>>,
) -> Result<Response, JsonError> {
    let url = layers_url(&state.config.geoserver_url);

    let relay = state
        .upstream
        .get_json(&url)
        .await
        .map_err(|e| GatewayError::upstream(REST_FAILED, e))?;

    let (status, headers, body) = relay.into_parts();
    Ok(relay_response(status, &headers, Body::from(body)))
}

/// Handle feature queries.
///
/// # Endpoint
///
/// `GET /features?bbox=minX,minY,maxX,maxY&layer=name[&workspace=ws][&limit=n][&attr=value...]`
///
/// # Query Parameters
///
/// - `bbox`: EPSG:4326 extent (required)
/// - `layer`: Layer name (required)
/// - `workspace`: Workspace override (defaults to the configured workspace)
/// - `limit`: Row limit 1-10000 (default: 1000)
/// - anything else: equality filter on that attribute
///
/// # Response
///
/// - `200 OK`: GeoJSON with `Cache-Control: public, max-age=15`
/// - non-200 upstream status: relayed with the upstream body
///
/// # Errors
///
/// - `400 Bad Request`: Invalid layer, bbox, workspace or limit
/// - `502 Bad Gateway`: GeoServer unreachable, timed out, or returned non-JSON
pub async fn features_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, JsonError> {
    let params = FeatureParams::from_pairs(pairs);
    let config = &state.config;

    let layer = params
        .layer
        .as_deref()
        .filter(|l| is_valid_identifier(l))
        .ok_or(ValidationError::InvalidLayer)?;

    let bbox = params.bbox.as_deref().ok_or(ValidationError::MissingBbox)?;
    let bbox = parse_bbox(bbox)?;

    let workspace = match params.workspace.as_deref() {
        None | Some("") => config.workspace.as_str(),
        Some(ws) if is_valid_identifier(ws) => ws,
        Some(_) => return Err(ValidationError::InvalidWorkspace.into()),
    };

    let limit = parse_limit(params.limit.as_deref())?;

    let filter = build_filter(
        &bbox,
        &config.geom_column,
        params
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
        &config.attributes,
    );

    let url = wfs_url(
        &config.geoserver_url,
        &WfsQuery {
            workspace,
            layer,
            count: limit,
            filter: &filter,
        },
    );
    debug!(workspace, layer, limit, filter = %filter, "WFS GetFeature");

    let relay = state
        .upstream
        .get_json(&url)
        .await
        .map_err(|e| GatewayError::upstream(WFS_FAILED, e))?;

    match relay {
        Relay::Success { body, .. } => {
            let features: serde_json::Value =
                serde_json::from_slice(&body).map_err(|e| GatewayError::InvalidUpstreamBody {
                    context: WFS_INVALID_JSON,
                    reason: e.to_string(),
                })?;

            Ok((
                StatusCode::OK,
                [(header::CACHE_CONTROL, FEATURES_CACHE_CONTROL)],
                Json(features),
            )
                .into_response())
        }
        Relay::Status {
            status,
            headers,
            body,
        } => {
            debug!(status = status.as_u16(), "Relaying WFS error status");
            Ok(relay_response(status, &headers, Body::from(body)))
        }
    }
}

/// Handle tile requests by streaming the tile from GeoWebCache.
///
/// # Endpoint
///
/// `GET /tiles/{layer}/{z}/{x}/{y}.pbf`
///
/// # Response
///
/// - `200 OK`: Tile bytes with upstream `Content-Type`/`Content-Encoding`
///   and `Cache-Control: public, max-age=3600`
/// - non-200 upstream status: relayed with its content type and body
///
/// The body is forwarded chunk by chunk as it arrives. If either the
/// upstream stops sending or the client stops reading for longer than the
/// stream timeout, the upstream is released and the connection is aborted.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid layer name or tile coordinates (plain text)
/// - `502 Bad Gateway`: GeoServer unreachable or timed out (plain text)
pub async fn tile_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, TextError> {
    let config = &state.config;

    if !is_valid_identifier(&params.layer) {
        return Err(ValidationError::InvalidLayer.into());
    }
    let y = params.y()?;
    let tile = validate_tile(&params.z, &params.x, y, config.max_z)?;

    let url = tile_url(
        &config.geoserver_url,
        &config.workspace,
        &params.layer,
        &config.tile_gridset,
        &tile,
    );

    let relay = state
        .upstream
        .get_stream(&url, TILE_ACCEPT)
        .await
        .map_err(|e| GatewayError::upstream(TILE_FAILED, e))?;

    let (status, headers, body) = relay.into_parts();
    let body = Body::from_stream(pump_body(body, config.stream_timeout, url));

    if status != StatusCode::OK {
        debug!(status = status.as_u16(), tile = %tile, "Relaying tile error status");
        let headers = PassthroughHeaders {
            content_type: headers
                .content_type
                .or_else(|| Some(HeaderValue::from_static("text/plain"))),
            content_encoding: None,
        };
        return Ok(relay_response(status, &headers, body));
    }

    let mut response = relay_response(status, &headers, body);
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(TILE_CACHE_CONTROL),
    );
    Ok(response)
}

// =============================================================================
// Tests
// =============================================================================
