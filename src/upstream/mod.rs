//! Upstream GeoServer access.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     HTTP Handlers                        │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ Upstream trait
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                    GeoServerClient                       │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │ reqwest pool │  │  semaphore   │  │  basic auth    │  │
//! │  │ (keep-alive) │  │ (max conns)  │  │  + timeouts    │  │
//! │  └──────────────┘  └──────────────┘  └────────────────┘  │
//! └────────────────────────────┬─────────────────────────────┘
//!                              ▼
//!            /wfs   /rest/layers.json   /gwc/service/tms
//! ```
//!
//! Every call resolves to either a [`Relay`] (the upstream answered, with
//! any status) or an [`UpstreamError`](crate::error::UpstreamError) (it did
//! not). Handlers match on the two rather than catching exceptions.

mod client;
mod stream;
mod urls;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use http::{header, HeaderMap, HeaderValue, StatusCode};

use crate::error::UpstreamError;

pub use client::{Credentials, GeoServerClient, DEFAULT_USER_AGENT};
pub use stream::{pump_body, PUMP_BUFFER_CHUNKS};
pub use urls::{layers_url, tile_url, wfs_url, WfsQuery, WFS_VERSION};

/// A live upstream body.
pub type ByteStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Response headers relayed to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassthroughHeaders {
    pub content_type: Option<HeaderValue>,
    pub content_encoding: Option<HeaderValue>,
}

impl PassthroughHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            content_type: headers.get(header::CONTENT_TYPE).cloned(),
            content_encoding: headers.get(header::CONTENT_ENCODING).cloned(),
        }
    }

    pub fn with_content_type(mut self, value: &'static str) -> Self {
        self.content_type = Some(HeaderValue::from_static(value));
        self
    }
}

/// An upstream answer. `Success` is exactly HTTP 200; anything else is
/// relayed as `Status`.
#[derive(Debug)]
pub enum Relay<B> {
    Success {
        headers: PassthroughHeaders,
        body: B,
    },
    Status {
        status: StatusCode,
        headers: PassthroughHeaders,
        body: B,
    },
}

impl<B> Relay<B> {
    pub fn new(status: StatusCode, headers: PassthroughHeaders, body: B) -> Self {
        if status == StatusCode::OK {
            Relay::Success { headers, body }
        } else {
            Relay::Status {
                status,
                headers,
                body,
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Relay::Success { .. } => StatusCode::OK,
            Relay::Status { status, .. } => *status,
        }
    }

    pub fn headers(&self) -> &PassthroughHeaders {
        match self {
            Relay::Success { headers, .. } | Relay::Status { headers, .. } => headers,
        }
    }

    pub fn into_parts(self) -> (StatusCode, PassthroughHeaders, B) {
        match self {
            Relay::Success { headers, body } => (StatusCode::OK, headers, body),
            Relay::Status {
                status,
                headers,
                body,
            } => (status, headers, body),
        }
    }
}

/// Read access to the upstream server.
///
/// Implementations must never turn a non-2xx status into an error, and must
/// not retry.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// GET `url` and buffer the whole body under the request timeout.
    async fn get_json(&self, url: &str) -> Result<Relay<Bytes>, UpstreamError>;

    /// GET `url` with the given `Accept` header. The request timeout covers
    /// only the wait for response headers; the body is returned unread.
    async fn get_stream(&self, url: &str, accept: &str) -> Result<Relay<ByteStream>, UpstreamError>;
}
