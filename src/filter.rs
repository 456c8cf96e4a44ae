//! CQL filter construction for WFS feature queries.
//!
//! A filter is always one spatial `BBOX(...)` predicate followed by zero or
//! more `key='value'` equality predicates, joined with `AND`:
//!
//! ```text
//! BBOX(geom, 0, 0, 1, 1, 'EPSG:4326') AND status='O''Brien' AND type='mine'
//! ```
//!
//! Attribute keys come from arbitrary extra query parameters, so they go
//! through a two-stage admission policy: the identifier grammar, then the
//! optional whitelist. Keys that fail either stage are dropped, not
//! reported. Values are embedded as single-quoted literals with every
//! embedded quote doubled, so a value can never close its literal.

use std::fmt;

use tracing::debug;

use crate::validate::{is_valid_identifier, BoundingBox};

/// Separator between predicates.
pub const PREDICATE_SEPARATOR: &str = " AND ";

/// Reference system named in the spatial predicate.
pub const BBOX_CRS: &str = "EPSG:4326";

/// Escape a value for use inside a CQL single-quoted literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Which attribute keys may become equality predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePolicy {
    whitelist: Vec<String>,
}

impl AttributePolicy {
    /// Accept any key that is a valid identifier.
    pub fn open() -> Self {
        Self::default()
    }

    /// Accept only identifiers listed in `whitelist`. An empty list means open.
    pub fn with_whitelist(whitelist: Vec<String>) -> Self {
        Self { whitelist }
    }

    pub fn whitelist(&self) -> &[String] {
        &self.whitelist
    }

    /// Whether `key` may be used as a filter attribute.
    pub fn admits(&self, key: &str) -> bool {
        is_valid_identifier(key)
            && (self.whitelist.is_empty() || self.whitelist.iter().any(|k| k == key))
    }
}

/// An ordered list of CQL predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    predicates: Vec<String>,
}

impl FilterExpression {
    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    /// Number of attribute predicates after the spatial one.
    pub fn attribute_count(&self) -> usize {
        self.predicates.len().saturating_sub(1)
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.predicates.join(PREDICATE_SEPARATOR))
    }
}

/// Build the filter for a feature query.
///
/// The spatial predicate comes first; attribute predicates follow in the
/// order the attributes were supplied.
pub fn build_filter<'a, I>(
    bbox: &BoundingBox,
    geom_column: &str,
    attributes: I,
    policy: &AttributePolicy,
) -> FilterExpression
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut predicates = vec![format!(
        "BBOX({}, {}, {}, {}, {}, '{}')",
        geom_column, bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y, BBOX_CRS
    )];

    for (key, value) in attributes {
        if !policy.admits(key) {
            debug!(key = key, "Dropping attribute filter");
            continue;
        }
        predicates.push(format!("{}='{}'", key, escape_literal(value)));
    }

    FilterExpression { predicates }
}
