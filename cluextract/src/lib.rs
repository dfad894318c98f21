//! CLU Extract - Common Land Unit downloads by area of interest
//!
//! This library pulls polygon features from an ArcGIS feature service for an
//! area of interest (AOI). Feature services cap how many records a single
//! query may return, so the AOI is first partitioned into fragments whose
//! estimated feature counts fit under that cap, then each fragment is fetched
//! and the results are merged into one deduplicated collection.
//!
//! # Architecture
//!
//! ```text
//! Aoi ──► Partitioner ──► [AcceptedRequest] ──► FetchOrchestrator ──► OutputCollection
//!             │                                        │                    │
//!             └──── count ───► FeatureService ◄── features                 ▼
//!                              (QueryClient)                         FeatureWriter
//! ```
//!
//! [`extract::ExtractJob`] wires these pieces together for a single run.

pub mod config;
pub mod display;
pub mod extract;
pub mod fetch;
pub mod geometry;
pub mod logging;
pub mod output;
pub mod partition;
pub mod service;

/// Version of the library, as recorded in Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
