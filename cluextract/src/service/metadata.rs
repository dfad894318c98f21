//! Response shapes for layer metadata and feature queries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::{EsriPolygon, SpatialReference};

use super::error::{QueryError, QueryResult};

/// One field of a layer, as described by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,

    /// ArcGIS field type, e.g. `esriFieldTypeString`.
    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct Extent {
    #[serde(rename = "spatialReference", default)]
    spatial_reference: Option<SpatialReference>,
}

/// Layer description returned by `GET {layer}?f=json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerMetadata {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "geometryType", default)]
    pub geometry_type: Option<String>,

    #[serde(rename = "maxRecordCount", default)]
    pub max_record_count: Option<u64>,

    #[serde(rename = "objectIdField", default)]
    pub object_id_field: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldInfo>,

    #[serde(default)]
    extent: Option<Extent>,
}

impl LayerMetadata {
    /// Parses a metadata response.
    pub fn from_value(value: Value) -> QueryResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| QueryError::InvalidResponse(format!("layer metadata: {}", e)))
    }

    /// Spatial reference of the layer extent, if reported.
    pub fn spatial_reference(&self) -> Option<SpatialReference> {
        self.extent.as_ref().and_then(|e| e.spatial_reference)
    }

    /// Record limit, ignoring a zero or missing value.
    pub fn record_limit(&self) -> Option<u64> {
        self.max_record_count.filter(|&n| n > 0)
    }
}

/// A feature as returned by a query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawFeature {
    #[serde(default)]
    pub attributes: Map<String, Value>,

    #[serde(default)]
    pub geometry: Option<EsriPolygon>,
}

/// Features returned by one query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeatureBatch {
    #[serde(default)]
    pub features: Vec<RawFeature>,

    /// Set by the service when more features matched than it returned.
    #[serde(rename = "exceededTransferLimit", default)]
    pub exceeded_transfer_limit: bool,
}

impl FeatureBatch {
    /// Parses a feature query response.
    pub fn from_value(value: Value) -> QueryResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| QueryError::InvalidResponse(format!("feature set: {}", e)))
    }
}

/// Reads `{"count": n}` from a count query response.
pub fn parse_count(value: &Value) -> QueryResult<u64> {
    value
        .get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| QueryError::InvalidResponse("count response without count".to_string()))
}
