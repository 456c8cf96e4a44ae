//! Input validation for untrusted request parameters.
//!
//! Everything a browser sends passes through here before it can reach the
//! upstream server:
//!
//! - [`is_valid_identifier`] - layer, workspace and attribute names
//! - [`validate_tile`] - z/x/y tile pyramid indices
//! - [`parse_bbox`] - EPSG:4326 bounding boxes
//! - [`parse_limit`] - feature row limits
//!
//! All functions are pure. Failures are [`ValidationError`]s whose messages
//! name the violated bound so clients can correct the request.
//!
//! [`ValidationError`]: crate::error::ValidationError

mod bbox;
mod identifier;
mod limit;
mod tile;

pub use bbox::{parse_bbox, BoundingBox};
pub use identifier::is_valid_identifier;
pub use limit::{parse_limit, DEFAULT_FEATURE_LIMIT, MAX_FEATURE_LIMIT, MIN_FEATURE_LIMIT};
pub use tile::{validate_tile, TileCoordinate, MAX_SUPPORTED_ZOOM};
