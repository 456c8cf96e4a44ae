//! Test utilities for integration tests.
//!
//! This module provides a mock upstream that records every request it
//! receives, plus helpers for driving the router and reading responses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use http_body_util::BodyExt;
use tokio::sync::RwLock;
use tower::ServiceExt;

use gis_gateway::error::UpstreamError;
use gis_gateway::upstream::{ByteStream, PassthroughHeaders, Relay, Upstream};
use gis_gateway::{create_router, GatewayConfig, RouterConfig};

/// Base URL the mock pretends to be.
pub const MOCK_GEOSERVER: &str = "http://geoserver.test/geoserver";

// =============================================================================
// Mock Upstream
// =============================================================================

/// What the mock answers with.
#[derive(Clone)]
pub enum MockReply {
    /// A complete response
    Body {
        status: StatusCode,
        headers: PassthroughHeaders,
        chunks: Vec<Bytes>,
        /// Never finish the body after the last chunk
        stall: bool,
    },

    /// A transport failure
    Fail(UpstreamError),
}

/// One request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub accept: Option<String>,
}

/// An upstream that replies with a fixed answer and records requests.
#[derive(Clone)]
pub struct MockUpstream {
    reply: MockReply,
    delay: Option<Duration>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    /// Answer 200 with a JSON body.
    pub fn json(body: &str) -> Self {
        Self::status(StatusCode::OK, "application/json", body)
    }

    /// Answer with the given status, content type and body.
    pub fn status(status: StatusCode, content_type: &'static str, body: &str) -> Self {
        Self::reply(MockReply::Body {
            status,
            headers: PassthroughHeaders::default().with_content_type(content_type),
            chunks: vec![Bytes::from(body.to_string())],
            stall: false,
        })
    }

    /// Answer with a body delivered in the given chunks.
    pub fn chunked(status: StatusCode, headers: PassthroughHeaders, chunks: &[&'static str]) -> Self {
        Self::reply(MockReply::Body {
            status,
            headers,
            chunks: chunks.iter().map(|c| Bytes::from_static(c.as_bytes())).collect(),
            stall: false,
        })
    }

    /// Answer 200, send `chunks`, then go silent without closing the body.
    pub fn stalling(chunks: &[&'static str]) -> Self {
        Self::reply(MockReply::Body {
            status: StatusCode::OK,
            headers: PassthroughHeaders::default().with_content_type("application/x-protobuf"),
            chunks: chunks.iter().map(|c| Bytes::from_static(c.as_bytes())).collect(),
            stall: true,
        })
    }

    /// Fail every request with a transport error.
    pub fn failing(err: UpstreamError) -> Self {
        Self::reply(MockReply::Fail(err))
    }

    fn reply(reply: MockReply) -> Self {
        Self {
            reply,
            delay: None,
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Wait `delay` before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// URL of the only request made so far.
    pub async fn single_url(&self) -> String {
        let requests = self.requests().await;
        assert_eq!(requests.len(), 1, "expected exactly one upstream request");
        requests[0].url.clone()
    }

    async fn record(&self, url: &str, accept: Option<&str>) {
        self.requests.write().await.push(RecordedRequest {
            url: url.to_string(),
            accept: accept.map(str::to_string),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn get_json(&self, url: &str) -> Result<Relay<Bytes>, UpstreamError> {
        self.record(url, None).await;
        match &self.reply {
            MockReply::Body {
                status,
                headers,
                chunks,
                ..
            } => Ok(Relay::new(*status, headers.clone(), chunks.concat().into())),
            MockReply::Fail(err) => Err(err.clone()),
        }
    }

    async fn get_stream(&self, url: &str, accept: &str) -> Result<Relay<ByteStream>, UpstreamError> {
        self.record(url, Some(accept)).await;
        match &self.reply {
            MockReply::Body {
                status,
                headers,
                chunks,
                stall,
            } => {
                let sent = stream::iter(chunks.clone().into_iter().map(Ok));
                let body: ByteStream = if *stall {
                    sent.chain(stream::pending()).boxed()
                } else {
                    sent.boxed()
                };
                Ok(Relay::new(*status, headers.clone(), body))
            }
            MockReply::Fail(err) => Err(err.clone()),
        }
    }
}

// =============================================================================
// Router Helpers
// =============================================================================

/// Gateway settings pointing at the mock, with MAX_Z=22.
pub fn gateway_config() -> GatewayConfig {
    GatewayConfig::new(MOCK_GEOSERVER).with_max_z(22)
}

/// Build a router over `upstream` with tracing disabled.
pub fn router(upstream: MockUpstream, gateway: GatewayConfig) -> Router {
    create_router(upstream, RouterConfig::new(gateway).with_tracing(false))
}

/// Send a GET request through the router.
pub async fn get(router: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Decoded value of query parameter `key` in `url`.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let parsed = url::Url::parse(url).unwrap();
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// A short idle window for stall tests.
pub const SHORT_STREAM_TIMEOUT: Duration = Duration::from_millis(100);
