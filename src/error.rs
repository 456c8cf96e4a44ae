use std::time::Duration;

use thiserror::Error;

/// Client input errors. Always reported as HTTP 400 and never forwarded upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Layer name missing or not an identifier
    #[error("Missing or invalid layer name")]
    InvalidLayer,

    /// Workspace override is not an identifier
    #[error("Invalid workspace name")]
    InvalidWorkspace,

    /// The `bbox` query parameter was not supplied
    #[error("Missing bbox")]
    MissingBbox,

    /// Wrong number of components or a non-finite component
    #[error("bbox must be \"minX,minY,maxX,maxY\"")]
    BboxShape,

    /// `minX >= maxX` or `minY >= maxY`
    #[error("bbox min must be less than max")]
    BboxOrder,

    /// A component falls outside longitude/latitude bounds
    #[error("bbox must be in EPSG:4326 range")]
    BboxRange,

    /// One of z/x/y is not a base-10 non-negative integer
    #[error("z/x/y must be integers")]
    TileNotInteger,

    /// Zoom level above the configured maximum
    #[error("z must be between 0 and {max_z}")]
    ZoomOutOfRange { max_z: u32 },

    /// Column or row index outside `[0, 2^z - 1]`
    #[error("x/y must be in [0, {max}] for z={z}")]
    TileOutOfRange { z: u32, max: u64 },

    /// Final tile path segment is not `{y}.pbf`
    #[error("tile path must end in .pbf")]
    TileExtension,

    /// Row limit is not an integer in `[1, 10000]`
    #[error("limit must be integer 1..10000")]
    InvalidLimit,
}

/// Failures talking to the upstream GeoServer.
///
/// An upstream that answers with a non-2xx status is *not* an error; those
/// responses are relayed to the client as-is.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The HTTP client could not be constructed
    #[error("Failed to build upstream client: {0}")]
    Build(String),

    /// Connection refused, DNS failure, TLS failure
    #[error("Connection error: {0}")]
    Connect(String),

    /// No response headers within the request timeout
    #[error("Upstream did not respond within {0:?}")]
    Timeout(Duration),

    /// Any other failure while sending the request
    #[error("Request error: {0}")]
    Request(String),

    /// The body failed mid-transfer
    #[error("Failed to read upstream body: {0}")]
    Body(String),

    /// No bytes arrived on a streamed body within the idle window
    #[error("Upstream stream stalled for {0:?}")]
    StreamStalled(Duration),

    /// The client stopped accepting streamed bytes within the idle window
    #[error("Client stopped reading for {0:?}")]
    ClientStalled(Duration),

    /// The connection limiter was shut down
    #[error("Upstream connection pool closed")]
    PoolClosed,
}

impl UpstreamError {
    /// Classify a reqwest error raised while sending a request.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(timeout)
        } else if err.is_connect() {
            UpstreamError::Connect(err.to_string())
        } else {
            UpstreamError::Request(err.to_string())
        }
    }
}

/// Errors surfaced by the HTTP handlers.
///
/// The `context` of an upstream failure is the only text the client sees;
/// the underlying [`UpstreamError`] is logged server side.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: UpstreamError,
    },

    /// Upstream answered 200 but the body was not JSON
    #[error("{context}: {reason}")]
    InvalidUpstreamBody {
        context: &'static str,
        reason: String,
    },
}

impl GatewayError {
    pub fn upstream(context: &'static str, source: UpstreamError) -> Self {
        GatewayError::Upstream { context, source }
    }

    /// The message safe to show to a client.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Validation(err) => err.to_string(),
            GatewayError::Upstream { context, .. } => (*context).to_string(),
            GatewayError::InvalidUpstreamBody { context, .. } => (*context).to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, GatewayError::Validation(_))
    }
}
