use crate::error::ValidationError;

/// A longitude/latitude extent in EPSG:4326.
///
/// Only values produced by [`parse_bbox`] are guaranteed to satisfy
/// `min < max` on both axes and to lie within `[-180, 180] x [-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Parse `"minX,minY,maxX,maxY"`.
///
/// Checks run shape first, then ordering, then geographic range; the first
/// failure decides the error.
pub fn parse_bbox(s: &str) -> Result<BoundingBox, ValidationError> {
    let parts = s
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<f64>>>()
        .ok_or(ValidationError::BboxShape)?;

    let &[min_x, min_y, max_x, max_y] = parts.as_slice() else {
        return Err(ValidationError::BboxShape);
    };

    if min_x >= max_x || min_y >= max_y {
        return Err(ValidationError::BboxOrder);
    }

    if min_x < -180.0 || max_x > 180.0 || min_y < -90.0 || max_y > 90.0 {
        return Err(ValidationError::BboxRange);
    }

    Ok(BoundingBox {
        min_x,
        min_y,
        max_x,
        max_y,
    })
}
