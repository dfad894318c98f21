//! Output collection schema and file writers.
//!
//! The schema mirrors the remote layer's fields; the writer produces either
//! an Esri JSON FeatureSet or a GeoJSON FeatureCollection named
//! `CLU_<aoi name>`.

mod feature;
mod schema;
mod writer;

pub use feature::OutputFeature;
pub use schema::{FieldType, OutputField, OutputSchema};
pub use writer::{
    output_name, FeatureWriter, OutputError, OutputFormat, OutputResult, OUTPUT_PREFIX,
};
