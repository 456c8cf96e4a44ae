use crate::error::ValidationError;

/// Row limit used when the client does not send one.
pub const DEFAULT_FEATURE_LIMIT: u32 = 1000;

/// Smallest accepted row limit.
pub const MIN_FEATURE_LIMIT: u32 = 1;

/// Largest accepted row limit. Caps heavy WFS queries.
pub const MAX_FEATURE_LIMIT: u32 = 10_000;

/// Resolve the optional `limit` query parameter.
///
/// Only plain base-10 digit strings are accepted; signs, decimals, exponents
/// and surrounding whitespace are rejected.
pub fn parse_limit(raw: Option<&str>) -> Result<u32, ValidationError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_FEATURE_LIMIT);
    };

    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidLimit);
    }

    match raw.parse::<u32>() {
        Ok(limit) if (MIN_FEATURE_LIMIT..=MAX_FEATURE_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(ValidationError::InvalidLimit),
    }
}
