//! Feature query integration tests.
//!
//! Tests verify:
//! - Validation messages and their order
//! - WFS URL and CQL filter construction
//! - Relaying of upstream statuses and failures

use axum::http::StatusCode;

use gis_gateway::error::UpstreamError;

use super::test_utils::{
    body_json, body_text, gateway_config, get, query_param, router, MockUpstream,
};

const FEATURE_COLLECTION: &str = r#"{"type":"FeatureCollection","features":[]}"#;

async fn assert_rejected(uri: &str, message: &str) {
    let upstream = MockUpstream::json(FEATURE_COLLECTION);
    let response = get(router(upstream.clone(), gateway_config()), uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    let body = body_json(response).await;
    assert_eq!(body["error"], message, "{}", uri);
    assert_eq!(upstream.request_count().await, 0, "{}", uri);
}

// =============================================================================
// Successful Queries
// =============================================================================

#[tokio::test]
async fn test_features_success() {
    let upstream = MockUpstream::json(FEATURE_COLLECTION);
    let response = get(
        router(upstream.clone(), gateway_config()),
        "/features?layer=roads&bbox=-10,-10.5,10,10.5&status=open",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=15"
    );
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let body = body_json(response).await;
    assert_eq!(body["type"], "FeatureCollection");

    let url = upstream.single_url().await;
    assert!(url.starts_with("http://geoserver.test/geoserver/wfs?"));
    assert_eq!(query_param(&url, "service").as_deref(), Some("WFS"));
    assert_eq!(query_param(&url, "request").as_deref(), Some("GetFeature"));
    assert_eq!(query_param(&url, "typeName").as_deref(), Some("demo:roads"));
    assert_eq!(
        query_param(&url, "outputFormat").as_deref(),
        Some("application/json")
    );
    assert_eq!(query_param(&url, "count").as_deref(), Some("1000"));
    assert_eq!(
        query_param(&url, "cql_filter").as_deref(),
        Some("BBOX(geom, -10, -10.5, 10, 10.5, 'EPSG:4326') AND status='open'")
    );
}

#[tokio::test]
async fn test_features_quote_is_escaped() {
    let upstream = MockUpstream::json(FEATURE_COLLECTION);
    let response = get(
        router(upstream.clone(), gateway_config()),
        "/features?layer=roads&bbox=0,0,1,1&status=O%27Brien",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cql = query_param(&upstream.single_url().await, "cql_filter").unwrap();
    assert!(cql.ends_with(" AND status='O''Brien'"), "{}", cql);
}

#[tokio::test]
async fn test_features_injection_stays_inside_literal() {
    let upstream = MockUpstream::json(FEATURE_COLLECTION);
    let response = get(
        router(upstream.clone(), gateway_config()),
        "/features?layer=roads&bbox=0,0,1,1&name=x%27%20OR%201%3D1%20--",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cql = query_param(&upstream.single_url().await, "cql_filter").unwrap();
    assert_eq!(
        cql,
        "BBOX(geom, 0, 0, 1, 1, 'EPSG:4326') AND name='x'' OR 1=1 --'"
    );
}

#[tokio::test]
async fn test_features_drop_invalid_attribute_keys() {
    let upstream = MockUpstream::json(FEATURE_COLLECTION);
    let response = get(
        router(upstream.clone(), gateway_config()),
        "/features?layer=roads&bbox=0,0,1,1&bad-key=1&a%20b=2&kind=road",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cql = query_param(&upstream.single_url().await, "cql_filter").unwrap();
    assert_eq!(cql, "BBOX(geom, 0, 0, 1, 1, 'EPSG:4326') AND kind='road'");
}

#[tokio::test]
async fn test_features_attribute_whitelist() {
    let upstream = MockUpstream::json(FEATURE_COLLECTION);
    let gateway = gateway_config().with_attr_whitelist(vec!["status".to_string()]);
    let response = get(
        router(upstream.clone(), gateway),
        "/features?layer=roads&bbox=0,0,1,1&type=primary&status=open",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cql = query_param(&upstream.single_url().await, "cql_filter").unwrap();
    assert_eq!(cql, "BBOX(geom, 0, 0, 1, 1, 'EPSG:4326') AND status='open'");
}

#[tokio::test]
async fn test_features_workspace_override() {
    let upstream = MockUpstream::json(FEATURE_COLLECTION);
    let response = get(
        router(upstream.clone(), gateway_config()),
        "/features?layer=rivers&bbox=0,0,1,1&workspace=hydro",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let url = upstream.single_url().await;
    assert_eq!(query_param(&url, "typeName").as_deref(), Some("hydro:rivers"));
}

#[tokio::test]
async fn test_features_empty_workspace_uses_default() {
    let upstream = MockUpstream::json(FEATURE_COLLECTION);
    let gateway = gateway_config().with_workspace("city");
    let response = get(
        router(upstream.clone(), gateway),
        "/features?layer=rivers&bbox=0,0,1,1&workspace=",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let url = upstream.single_url().await;
    assert_eq!(query_param(&url, "typeName").as_deref(), Some("city:rivers"));
}

#[tokio::test]
async fn test_features_limit_boundaries_accepted() {
    for (limit, expected) in [("1", "1"), ("10000", "10000"), ("250", "250")] {
        let upstream = MockUpstream::json(FEATURE_COLLECTION);
        let uri = format!("/features?layer=roads&bbox=0,0,1,1&limit={}", limit);
        let response = get(router(upstream.clone(), gateway_config()), &uri).await;
        assert_eq!(response.status(), StatusCode::OK, "limit={}", limit);

        let url = upstream.single_url().await;
        assert_eq!(query_param(&url, "count").as_deref(), Some(expected));
    }
}

// =============================================================================
// Validation Failures
// =============================================================================

#[tokio::test]
async fn test_features_missing_layer() {
    assert_rejected("/features?bbox=0,0,1,1", "Missing or invalid layer name").await;
}

#[tokio::test]
async fn test_features_invalid_layer() {
    assert_rejected(
        "/features?layer=roads%3Bdrop&bbox=0,0,1,1",
        "Missing or invalid layer name",
    )
    .await;
    assert_rejected(
        "/features?layer=demo:roads&bbox=0,0,1,1",
        "Missing or invalid layer name",
    )
    .await;
}

#[tokio::test]
async fn test_features_repeated_layer_is_invalid() {
    assert_rejected(
        "/features?layer=roads&layer=rivers&bbox=0,0,1,1",
        "Missing or invalid layer name",
    )
    .await;
}

#[tokio::test]
async fn test_features_layer_checked_before_bbox() {
    assert_rejected("/features", "Missing or invalid layer name").await;
}

#[tokio::test]
async fn test_features_missing_bbox() {
    assert_rejected("/features?layer=roads", "Missing bbox").await;
}

#[tokio::test]
async fn test_features_bbox_shape() {
    for bbox in ["1,2,3", "1,2,3,4,5", "a,b,c,d", "1,,3,4", "NaN,0,1,1"] {
        let uri = format!("/features?layer=roads&bbox={}", bbox);
        assert_rejected(&uri, "bbox must be \"minX,minY,maxX,maxY\"").await;
    }
}

#[tokio::test]
async fn test_features_bbox_order() {
    assert_rejected(
        "/features?layer=roads&bbox=10,10,5,5",
        "bbox min must be less than max",
    )
    .await;
    assert_rejected(
        "/features?layer=roads&bbox=0,0,0,1",
        "bbox min must be less than max",
    )
    .await;
}

#[tokio::test]
async fn test_features_bbox_range() {
    assert_rejected(
        "/features?layer=roads&bbox=0,0,181,1",
        "bbox must be in EPSG:4326 range",
    )
    .await;
    assert_rejected(
        "/features?layer=roads&bbox=0,-91,1,1",
        "bbox must be in EPSG:4326 range",
    )
    .await;
}

#[tokio::test]
async fn test_features_invalid_workspace() {
    assert_rejected(
        "/features?layer=roads&bbox=0,0,1,1&workspace=bad-ws",
        "Invalid workspace name",
    )
    .await;
}

#[tokio::test]
async fn test_features_invalid_limit() {
    for limit in ["0", "10001", "abc", "1.5", "-1", ""] {
        let uri = format!("/features?layer=roads&bbox=0,0,1,1&limit={}", limit);
        assert_rejected(&uri, "limit must be integer 1..10000").await;
    }
}

// =============================================================================
// Upstream Behavior
// =============================================================================

#[tokio::test]
async fn test_features_upstream_error_status_relayed() {
    let upstream = MockUpstream::status(
        StatusCode::BAD_REQUEST,
        "application/xml",
        "<ows:ExceptionReport/>",
    );
    let response = get(
        router(upstream, gateway_config()),
        "/features?layer=roads&bbox=0,0,1,1",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/xml"
    );
    assert!(response.headers().get("cache-control").is_none());
    assert_eq!(body_text(response).await, "<ows:ExceptionReport/>");
}

#[tokio::test]
async fn test_features_upstream_invalid_json() {
    let upstream = MockUpstream::status(StatusCode::OK, "text/html", "<html>login</html>");
    let response = get(
        router(upstream, gateway_config()),
        "/features?layer=roads&bbox=0,0,1,1",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Upstream WFS returned invalid JSON");
}

#[tokio::test]
async fn test_features_upstream_unreachable() {
    let upstream = MockUpstream::failing(UpstreamError::Timeout(std::time::Duration::from_secs(15)));
    let response = get(
        router(upstream.clone(), gateway_config()),
        "/features?layer=roads&bbox=0,0,1,1",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Upstream WFS failed");
    assert_eq!(upstream.request_count().await, 1);
}
