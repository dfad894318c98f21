//! The extract workflow.
//!
//! 1. Load layer metadata and build the output schema
//! 2. Resolve the record limit
//! 3. Create the (empty) output
//! 4. Partition the AOI into requests
//! 5. Fetch every request, then retry failures once
//! 6. Drop features outside the AOI
//! 7. Write the output

use std::path::PathBuf;
use std::sync::Arc;

use geo::Intersects;
use tracing::{debug, info, warn};

use crate::fetch::{
    FailedRequest, FeatureFetcher, FetchOrchestrator, FetchProgressCallback, FetchState,
    OutputCollection,
};
use crate::geometry::{Aoi, SpatialReference};
use crate::output::{FeatureWriter, OutputSchema};
use crate::partition::{AbandonedRegion, Partitioner, RequestKey};
use crate::service::{
    Credentials, FeatureLayer, FeatureService, LayerMetadata, QueryClient, QueryResult,
    ReqwestClient,
};

use super::config::ExtractConfig;
use super::error::{ExtractError, ExtractResult};

/// Progress callback for extract runs.
///
/// # Arguments
///
/// * `stage` - Current stage
/// * `completed` - Work done within the stage (requests while fetching)
/// * `total` - Total work within the stage
pub type ExtractProgressCallback = Box<dyn Fn(ExtractStage, usize, usize) + Send + Sync>;

/// Stages of an extract run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStage {
    LoadingMetadata,
    Partitioning,
    Fetching,
    Retrying,
    Selecting,
    Writing,
    Complete,
}

impl ExtractStage {
    /// Get a human-readable name for the stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadingMetadata => "Loading layer metadata",
            Self::Partitioning => "Determining requests",
            Self::Fetching => "Fetching features",
            Self::Retrying => "Retrying failed requests",
            Self::Selecting => "Selecting intersecting features",
            Self::Writing => "Writing output",
            Self::Complete => "Complete",
        }
    }
}

/// Outcome of an extract run.
#[derive(Debug, Clone)]
pub struct ExtractReport {
    /// Output name (`CLU_<aoi name>`).
    pub output_name: String,
    pub output_path: PathBuf,
    /// Record limit the requests were sized for.
    pub record_limit: u64,
    /// Spatial reference of the layer extent, if the service reported one.
    /// Output geometry is always in the AOI's spatial reference.
    pub layer_spatial_reference: Option<SpatialReference>,
    /// Number of accepted requests.
    pub requests: usize,
    /// Sum of the counts estimated for the accepted requests.
    pub estimated_features: u64,
    /// Regions the partitioner gave up on.
    pub abandoned: Vec<AbandonedRegion>,
    /// Features written to the output.
    pub features: usize,
    /// Features skipped because their identifier was already present.
    pub duplicates: usize,
    /// Features dropped for not intersecting the AOI.
    pub outside_aoi: usize,
    /// Requests the service answered only partially.
    pub truncated: Vec<RequestKey>,
    /// Requests that failed twice and were dropped.
    pub failed: Vec<FailedRequest>,
}

impl ExtractReport {
    /// Every request succeeded and no region was abandoned.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.abandoned.is_empty()
    }
}

/// Builds the feature layer for a run over HTTP.
///
/// Queries use `spatial_reference` for both input and output geometry, and
/// are retried once after `config.retry_delay`.
pub fn connect(
    config: &ExtractConfig,
    credentials: Credentials,
    spatial_reference: SpatialReference,
) -> ExtractResult<FeatureLayer<ReqwestClient>> {
    let http = ReqwestClient::with_timeout(config.timeout.as_secs().max(1))
        .map_err(ExtractError::Setup)?;
    let client = QueryClient::new(http, credentials).with_retry_policy(config.query_retry_policy());

    let layer = FeatureLayer::new(client, &config.layer_url)
        .map_err(ExtractError::Setup)?
        .with_spatial_reference(spatial_reference);
    Ok(layer)
}

/// Extracts the features of a layer that fall inside an AOI.
pub struct ExtractJob<S: FeatureService> {
    service: S,
    config: ExtractConfig,
}

impl<S: FeatureService> ExtractJob<S> {
    /// Create a new extract job.
    ///
    /// # Arguments
    ///
    /// * `service` - Layer to query; its spatial reference should match the AOI's
    /// * `config` - Run settings
    pub fn new(service: S, config: ExtractConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Features the service reports inside the AOI.
    pub fn count(&self, aoi: &Aoi) -> QueryResult<u64> {
        self.service.count(aoi.geometry())
    }

    /// Runs the full workflow for `aoi`.
    ///
    /// Requests that fail twice do not end the run; they are listed in the
    /// report and their features are missing from the output.
    ///
    /// # Errors
    ///
    /// * [`ExtractError::Metadata`] if the layer description cannot be loaded
    /// * [`ExtractError::Partition`] if the AOI cannot be counted or no
    ///   request was determined
    /// * [`ExtractError::Output`] if the output cannot be written
    pub fn run(
        &self,
        aoi: &Aoi,
        on_progress: Option<ExtractProgressCallback>,
    ) -> ExtractResult<ExtractReport> {
        let on_progress = on_progress.map(Arc::new);
        let report = |stage: ExtractStage, completed: usize, total: usize| {
            if let Some(ref cb) = on_progress {
                cb(stage, completed, total);
            }
        };

        report(ExtractStage::LoadingMetadata, 0, 1);
        let metadata = self.service.metadata().map_err(ExtractError::Metadata)?;
        let schema = OutputSchema::from_metadata(&metadata);
        if schema.field(&self.config.identifier_field).is_none() {
            warn!(
                field = %self.config.identifier_field,
                "Identifier field not in layer, features will be keyed by geometry"
            );
        }
        let limit = self.record_limit(&metadata);
        let layer_spatial_reference = metadata.spatial_reference();
        check_spatial_reference(layer_spatial_reference, aoi.spatial_reference());
        report(ExtractStage::LoadingMetadata, 1, 1);

        let writer = FeatureWriter::create(
            &self.config.output_dir,
            aoi.name(),
            self.config.format,
            schema.clone(),
            aoi.spatial_reference(),
        )?;
        info!(name = writer.name(), path = %writer.path().display(), "Created output");

        report(ExtractStage::Partitioning, 0, 1);
        let partitioner = Partitioner::new(self.config.partition.clone(), self.config.strategy);
        let partition =
            partitioner.partition(aoi.geometry(), limit, |region| self.service.count(region))?;
        let estimated_features = partition.estimated_features();
        info!(
            requests = partition.accepted.len(),
            estimated_features, "Determined requests"
        );
        if !partition.abandoned.is_empty() {
            warn!(
                regions = partition.abandoned.len(),
                "Some regions were abandoned and will not be fetched"
            );
        }
        report(ExtractStage::Partitioning, 1, 1);

        let collection = OutputCollection::new();
        let fetcher = FeatureFetcher::new(&self.service, &schema)
            .with_identifier_field(self.config.identifier_field.clone())
            .with_date_format(self.config.date_format.clone());
        let mut state = FetchState::new(partition.accepted);
        let orchestrator = FetchOrchestrator::new(self.config.parallel);

        report(ExtractStage::Fetching, 0, state.total());
        orchestrator.fetch_all(
            &mut state,
            &fetcher,
            &collection,
            stage_callback(&on_progress, ExtractStage::Fetching),
        );

        let failed = if state.has_failures() {
            report(ExtractStage::Retrying, state.completed, state.total());
            orchestrator.retry_failed(
                &mut state,
                &fetcher,
                &collection,
                stage_callback(&on_progress, ExtractStage::Retrying),
            )
        } else {
            Vec::new()
        };

        if state.is_complete() {
            info!(requests = state.total(), "Every request fetched");
        }

        let outside_aoi = if self.config.select_intersecting {
            report(ExtractStage::Selecting, 0, collection.len());
            let removed = collection.retain(|f| f.geometry.intersects(aoi.geometry()));
            if removed > 0 {
                info!(removed, "Removed features outside the area of interest");
            }
            removed
        } else {
            0
        };

        let features = collection.into_features();
        report(ExtractStage::Writing, 0, features.len());
        writer.write(&features)?;
        info!(
            features = features.len(),
            path = %writer.path().display(),
            "Wrote output"
        );

        report(ExtractStage::Complete, 1, 1);

        Ok(ExtractReport {
            output_name: writer.name().to_string(),
            output_path: writer.path().to_path_buf(),
            record_limit: limit,
            layer_spatial_reference,
            requests: state.total(),
            estimated_features,
            abandoned: partition.abandoned,
            features: features.len(),
            duplicates: state.duplicates,
            outside_aoi,
            truncated: state.truncated,
            failed,
        })
    }

    fn record_limit(&self, metadata: &LayerMetadata) -> u64 {
        match metadata.record_limit() {
            Some(limit) => {
                info!(limit, "Service record limit");
                limit
            }
            None => {
                warn!(
                    fallback = self.config.fallback_record_limit,
                    "Layer did not report maxRecordCount, using fallback"
                );
                self.config.fallback_record_limit
            }
        }
    }
}

/// Logs how the layer's spatial reference relates to the AOI's.
///
/// Queries ask the service to project into the AOI's spatial reference, so a
/// mismatch is reported but not an error.
fn check_spatial_reference(layer: Option<SpatialReference>, aoi: SpatialReference) {
    let Some(layer) = layer else {
        debug!("Layer did not report an extent spatial reference");
        return;
    };

    if layer.effective_wkid() == aoi.effective_wkid() {
        debug!(wkid = ?layer.effective_wkid(), "Layer and AOI share a spatial reference");
    } else {
        warn!(
            layer_wkid = ?layer.effective_wkid(),
            aoi_wkid = ?aoi.effective_wkid(),
            "Layer spatial reference differs from the AOI, output is projected to the AOI"
        );
    }
}

/// Adapts the run callback to a fetch pass.
fn stage_callback(
    on_progress: &Option<Arc<ExtractProgressCallback>>,
    stage: ExtractStage,
) -> Option<Arc<FetchProgressCallback>> {
    on_progress.as_ref().map(|cb| {
        let cb = Arc::clone(cb);
        let forward: FetchProgressCallback =
            Box::new(move |completed: usize, total: usize| cb(stage, completed, total));
        Arc::new(forward)
    })
}
