//! Upstream URL construction.
//!
//! Only validated values reach these functions: identifiers for workspace
//! and layer, bounds-checked tile coordinates, and a filter built by
//! [`crate::filter`]. The WFS query string is still form-encoded so CQL
//! quotes and spaces survive the trip.

use url::form_urlencoded;

use crate::filter::FilterExpression;
use crate::validate::TileCoordinate;

/// WFS protocol version requested from the upstream.
pub const WFS_VERSION: &str = "2.0.0";

/// Output format requested for WFS GetFeature.
pub const WFS_OUTPUT_FORMAT: &str = "application/json";

/// Parameters of one WFS GetFeature request.
#[derive(Debug, Clone)]
pub struct WfsQuery<'a> {
    pub workspace: &'a str,
    pub layer: &'a str,
    pub count: u32,
    pub filter: &'a FilterExpression,
}

/// `{base}/wfs?service=WFS&version=2.0.0&request=GetFeature&...`
pub fn wfs_url(base: &str, query: &WfsQuery<'_>) -> String {
    let type_name = format!("{}:{}", query.workspace, query.layer);
    let count = query.count.to_string();
    let cql = query.filter.to_string();

    let params = form_urlencoded::Serializer::new(String::new())
        .append_pair("service", "WFS")
        .append_pair("version", WFS_VERSION)
        .append_pair("request", "GetFeature")
        .append_pair("typeName", &type_name)
        .append_pair("outputFormat", WFS_OUTPUT_FORMAT)
        .append_pair("count", &count)
        .append_pair("cql_filter", &cql)
        .finish();

    format!("{}/wfs?{}", base, params)
}

/// `{base}/rest/layers.json`
pub fn layers_url(base: &str) -> String {
    format!("{}/rest/layers.json", base)
}

/// `{base}/gwc/service/tms/1.0.0/{workspace}:{layer}@{gridset}@pbf/{z}/{x}/{y}.pbf`
pub fn tile_url(
    base: &str,
    workspace: &str,
    layer: &str,
    gridset: &str,
    tile: &TileCoordinate,
) -> String {
    format!(
        "{}/gwc/service/tms/1.0.0/{}:{}@{}@pbf/{}/{}/{}.pbf",
        base, workspace, layer, gridset, tile.z, tile.x, tile.y
    )
}
