//! Output file writers.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{json, Value};
use tracing::info;

use crate::geometry::{multi_polygon_to_geojson, EsriPolygon, SpatialReference, WGS84_WKID};

use super::feature::OutputFeature;
use super::schema::OutputSchema;

/// Prefix of every output name.
pub const OUTPUT_PREFIX: &str = "CLU_";

/// Result type for output operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// Errors that can occur while writing output.
#[derive(Debug)]
pub enum OutputError {
    /// The output directory could not be created.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// An existing output could not be removed.
    RemoveFailed { path: PathBuf, source: io::Error },

    /// The output file could not be written.
    WriteFailed { path: PathBuf, source: io::Error },

    /// The collection could not be encoded.
    EncodeFailed { path: PathBuf, reason: String },
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create output directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::RemoveFailed { path, source } => {
                write!(
                    f,
                    "failed to remove existing output {}: {}",
                    path.display(),
                    source
                )
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::EncodeFailed { path, reason } => {
                write!(f, "failed to encode {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::RemoveFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::EncodeFailed { .. } => None,
        }
    }
}

/// Output file encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Esri JSON FeatureSet (`.json`).
    #[default]
    EsriJson,
    /// GeoJSON FeatureCollection (`.geojson`).
    GeoJson,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::EsriJson => "json",
            OutputFormat::GeoJson => "geojson",
        }
    }

    /// Configuration file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::EsriJson => "esri_json",
            OutputFormat::GeoJson => "geojson",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "esrijson" | "esri" | "json" => Ok(OutputFormat::EsriJson),
            "geojson" => Ok(OutputFormat::GeoJson),
            other => Err(format!(
                "unknown output format '{}' (expected esri_json or geojson)",
                other
            )),
        }
    }
}

/// Output name for an AOI (`CLU_<aoi name>`).
pub fn output_name(aoi_name: &str) -> String {
    format!("{}{}", OUTPUT_PREFIX, aoi_name)
}

/// Writes the output collection for one run.
///
/// [`FeatureWriter::create`] replaces any previous output with an empty
/// collection; [`FeatureWriter::write`] stores the final features.
#[derive(Debug)]
pub struct FeatureWriter {
    name: String,
    path: PathBuf,
    format: OutputFormat,
    schema: OutputSchema,
    spatial_reference: SpatialReference,
}

impl FeatureWriter {
    /// Creates an empty output named after the AOI in `directory`.
    ///
    /// An existing file with the same name is deleted first.
    pub fn create(
        directory: &Path,
        aoi_name: &str,
        format: OutputFormat,
        schema: OutputSchema,
        spatial_reference: SpatialReference,
    ) -> OutputResult<Self> {
        fs::create_dir_all(directory).map_err(|e| OutputError::CreateDirFailed {
            path: directory.to_path_buf(),
            source: e,
        })?;

        let name = output_name(aoi_name);
        let path = directory.join(format!("{}.{}", name, format.extension()));

        if path.exists() {
            fs::remove_file(&path).map_err(|e| OutputError::RemoveFailed {
                path: path.clone(),
                source: e,
            })?;
            info!(path = %path.display(), "Output exists, deleted");
        }

        let writer = Self {
            name,
            path,
            format,
            schema,
            spatial_reference,
        };
        writer.write(&[])?;
        Ok(writer)
    }

    /// Output name (`CLU_<aoi name>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `features`, replacing the file contents.
    pub fn write(&self, features: &[OutputFeature]) -> OutputResult<()> {
        let document = match self.format {
            OutputFormat::EsriJson => self.esri_feature_set(features),
            OutputFormat::GeoJson => self.geojson_collection(features),
        };

        let file = File::create(&self.path).map_err(|e| OutputError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;
        let mut out = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut out, &document).map_err(|e| {
            OutputError::EncodeFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        out.flush().map_err(|e| OutputError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn esri_feature_set(&self, features: &[OutputFeature]) -> Value {
        let fields: Vec<_> = self.schema.fields().iter().map(|f| f.to_esri_json()).collect();
        let features: Vec<Value> = features
            .iter()
            .map(|feature| {
                let polygon = EsriPolygon::from_multi_polygon(&feature.geometry, None);
                json!({
                    "attributes": feature.attributes,
                    "geometry": polygon,
                })
            })
            .collect();

        json!({
            "displayFieldName": "",
            "geometryType": "esriGeometryPolygon",
            "spatialReference": self.spatial_reference,
            "fields": fields,
            "features": features,
        })
    }

    fn geojson_collection(&self, features: &[OutputFeature]) -> Value {
        let features: Vec<Value> = features
            .iter()
            .map(|feature| {
                json!({
                    "type": "Feature",
                    "properties": feature.attributes,
                    "geometry": multi_polygon_to_geojson(&feature.geometry),
                })
            })
            .collect();

        let mut collection = json!({
            "type": "FeatureCollection",
            "name": self.name,
            "features": features,
        });

        match self.spatial_reference.effective_wkid() {
            Some(wkid) if wkid != WGS84_WKID => {
                collection["crs"] = json!({
                    "type": "name",
                    "properties": {"name": format!("EPSG:{}", wkid)},
                });
            }
            _ => {}
        }

        collection
    }
}
