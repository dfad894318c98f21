//! Features held in the output collection.

use geo::MultiPolygon;
use serde_json::{Map, Value};

/// A deduplicated feature ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFeature {
    /// Deduplication key: the identifier attribute, or the serialized
    /// geometry when the identifier is missing.
    pub id: String,
    /// Attributes restricted to the output schema, dates already formatted.
    pub attributes: Map<String, Value>,
    pub geometry: MultiPolygon<f64>,
}
