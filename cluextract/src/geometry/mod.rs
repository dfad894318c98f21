//! Area-of-interest geometry.
//!
//! Provides the [`Aoi`] input type, Esri JSON and GeoJSON encodings, and the
//! subdivision strategies the partitioner uses to cut oversized regions.

mod esri;
mod geojson;
mod subdivide;

pub use esri::{multi_polygon_from_feature_set, EsriPolygon, SpatialReference, WGS84_WKID};
pub use geojson::{multi_polygon_from_geojson, multi_polygon_to_geojson};
pub use subdivide::{EqualAreaSubdivider, GridSubdivider, Subdivide, SubdivisionStrategy};

use std::fs;
use std::path::{Path, PathBuf};

use geo::{Area, MultiPolygon};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading an area of interest.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The AOI file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The AOI file is not valid JSON, or coordinates are malformed.
    #[error("invalid JSON geometry: {0}")]
    Json(#[source] serde_json::Error),

    /// The JSON is valid but does not describe polygons.
    #[error("unsupported geometry: {0}")]
    Unsupported(String),

    /// No polygon area was found.
    #[error("area of interest contains no polygons")]
    Empty,
}

/// An immutable area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Aoi {
    name: String,
    geometry: MultiPolygon<f64>,
    spatial_reference: SpatialReference,
}

impl Aoi {
    /// Creates an AOI from an existing geometry.
    pub fn new(
        name: impl Into<String>,
        geometry: MultiPolygon<f64>,
        spatial_reference: SpatialReference,
    ) -> Result<Self, GeometryError> {
        if geometry.0.is_empty() || geometry.unsigned_area() <= 0.0 {
            return Err(GeometryError::Empty);
        }

        Ok(Self {
            name: name.into(),
            geometry,
            spatial_reference,
        })
    }

    /// Reads an AOI from a GeoJSON or Esri JSON file.
    ///
    /// The AOI is named after the file stem. GeoJSON input is taken to be in
    /// WGS84; Esri JSON input (a polygon or a feature set, such as a previous
    /// extract) uses its embedded spatial reference, falling back to WGS84.
    pub fn from_file(path: &Path) -> Result<Self, GeometryError> {
        let text = fs::read_to_string(path).map_err(|e| GeometryError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "aoi".to_string());

        Self::from_json_str(name, &text)
    }

    /// Parses an AOI from JSON text.
    pub fn from_json_str(name: impl Into<String>, text: &str) -> Result<Self, GeometryError> {
        let value: Value = serde_json::from_str(text).map_err(GeometryError::Json)?;

        if value.get("rings").is_some() {
            let esri: EsriPolygon =
                serde_json::from_value(value).map_err(GeometryError::Json)?;
            let spatial_reference = esri.spatial_reference.unwrap_or_default();
            return Self::new(name, esri.to_multi_polygon(), spatial_reference);
        }

        if value.get("features").is_some() && value.get("type").is_none() {
            let (geometry, spatial_reference) = multi_polygon_from_feature_set(&value)?;
            return Self::new(name, geometry, spatial_reference.unwrap_or_default());
        }

        let geometry = multi_polygon_from_geojson(&value)?;
        Self::new(name, geometry, SpatialReference::wgs84())
    }

    /// Name used for output naming (`CLU_<name>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The AOI boundary.
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Spatial reference the AOI coordinates are expressed in.
    pub fn spatial_reference(&self) -> SpatialReference {
        self.spatial_reference
    }
}
