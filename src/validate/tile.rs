use std::fmt;

use crate::error::ValidationError;

/// Highest zoom level the gateway can be configured to serve.
///
/// Keeps `2^z - 1` inside a `u32`.
pub const MAX_SUPPORTED_ZOOM: u32 = 30;

/// One tile in a quad-tree pyramid.
///
/// At zoom `z` there are `2^z x 2^z` tiles, so `x` and `y` lie in
/// `[0, 2^z - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoordinate {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoordinate {
    /// Largest valid column/row index at zoom `z`, or `None` when `2^z`
    /// does not fit a `u64`.
    pub fn max_index(z: u32) -> Option<u64> {
        1u64.checked_shl(z).map(|tiles| tiles - 1)
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Validate raw z/x/y path segments against the pyramid bounds.
///
/// Checks run in a fixed order so the first violated bound decides the
/// message: integer syntax for all three, then zoom, then column/row.
/// Digit strings too large for the integer type are out of range, not
/// malformed.
pub fn validate_tile(z: &str, x: &str, y: &str, max_z: u32) -> Result<TileCoordinate, ValidationError> {
    if !is_digits(z) || !is_digits(x) || !is_digits(y) {
        return Err(ValidationError::TileNotInteger);
    }

    let zoom_err = ValidationError::ZoomOutOfRange { max_z };
    let z: u32 = z.parse().map_err(|_| zoom_err.clone())?;
    if z > max_z {
        return Err(zoom_err);
    }

    let max = TileCoordinate::max_index(z).ok_or(zoom_err)?;
    let range_err = ValidationError::TileOutOfRange { z, max };
    let in_range = |v: &str| -> Result<u32, ValidationError> {
        let v: u64 = v.parse().map_err(|_| range_err.clone())?;
        if v > max {
            return Err(range_err.clone());
        }
        u32::try_from(v).map_err(|_| range_err.clone())
    };

    let x = in_range(x)?;
    let y = in_range(y)?;

    Ok(TileCoordinate { z, x, y })
}
