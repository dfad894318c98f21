//! Fetch pass orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use super::collection::OutputCollection;
use super::fetcher::FeatureFetcher;
use super::state::{FailedRequest, FetchState};
use super::strategy::{FetchProgressCallback, FetchStrategy, ParallelStrategy, SequentialStrategy};

/// Runs the fetch pass and the single retry pass over failed requests.
///
/// The strategy is chosen from the concurrency setting: one request at a
/// time runs sequentially, anything higher runs in parallel batches.
#[derive(Debug)]
pub struct FetchOrchestrator {
    concurrency: usize,
}

impl Default for FetchOrchestrator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FetchOrchestrator {
    /// Creates an orchestrator running up to `concurrency` requests at once.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn strategy(&self) -> Box<dyn FetchStrategy> {
        if self.concurrency <= 1 {
            Box::new(SequentialStrategy::new())
        } else {
            Box::new(ParallelStrategy::new(self.concurrency))
        }
    }

    /// Fetches every request in `state`.
    ///
    /// Failures are recorded in `state.failed`; call
    /// [`FetchOrchestrator::retry_failed`] to give them a second chance.
    pub fn fetch_all(
        &self,
        state: &mut FetchState,
        fetcher: &FeatureFetcher<'_>,
        collection: &OutputCollection,
        on_progress: Option<Arc<FetchProgressCallback>>,
    ) {
        let indices: Vec<usize> = (0..state.total()).collect();
        self.strategy()
            .execute(state, &indices, fetcher, collection, on_progress.as_ref());

        if state.has_failures() {
            warn!(
                failed = state.failure_count(),
                "Some requests failed, they will be retried once"
            );
        }
    }

    /// Retries every failed request exactly once.
    ///
    /// Returns the requests that failed again; they are not retried further.
    pub fn retry_failed(
        &self,
        state: &mut FetchState,
        fetcher: &FeatureFetcher<'_>,
        collection: &OutputCollection,
        on_progress: Option<Arc<FetchProgressCallback>>,
    ) -> Vec<FailedRequest> {
        let failures = state.take_failures();
        if failures.is_empty() {
            return Vec::new();
        }

        info!(count = failures.len(), "Retrying failed requests");
        let indices: Vec<usize> = failures.iter().map(|f| f.index).collect();
        self.strategy()
            .execute(state, &indices, fetcher, collection, on_progress.as_ref());

        for failure in &state.failed {
            warn!(request = %failure.key, reason = %failure.reason, "Request failed permanently");
        }
        state.failed.clone()
    }
}
