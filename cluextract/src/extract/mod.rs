//! One extract run, end to end.
//!
//! ```ignore
//! use cluextract::extract::{connect, ExtractConfig, ExtractJob};
//!
//! let config = ExtractConfig::from_config_file(&config_file);
//! let layer = connect(&config, credentials, aoi.spatial_reference())?;
//! let report = ExtractJob::new(layer, config).run(&aoi, None)?;
//! println!("{} features in {}", report.features, report.output_path.display());
//! ```

mod config;
mod error;
mod job;

pub use config::ExtractConfig;
pub use error::{ExtractError, ExtractResult};
pub use job::{connect, ExtractJob, ExtractProgressCallback, ExtractReport, ExtractStage};
