//! HTTP server layer for the gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   /features   /layers   /tiles/{layer}/{z}/{x}/{y}.pbf          │
//! │                                                                 │
//! │  ┌──────────────────┐  ┌────────────────────────────────────┐   │
//! │  │    handlers      │  │              routes                │   │
//! │  │ (validate+relay) │  │ (router, CORS, headers, timeouts)  │   │
//! │  └──────────────────┘  └────────────────────────────────────┘   │
//! │                 serve (accept loop, header timeout)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;
pub mod serve;

pub use handlers::{
    features_handler, health_handler, layers_handler, tile_handler, AppState, ErrorResponse,
    FeatureParams, HealthResponse, JsonError, TextError, TilePathParams, FEATURES_CACHE_CONTROL,
    TILE_ACCEPT, TILE_CACHE_CONTROL,
};
pub use routes::{create_router, RouterConfig, SECURITY_HEADERS};
pub use serve::{serve, ServeConfig};
