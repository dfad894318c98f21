//! Fetch strategies.
//!
//! Sequential fetching submits one request at a time. Parallel fetching runs
//! fixed-size batches of requests on scoped threads; the output collection
//! is shared between them and serializes the dedup check and append.

use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::service::{QueryError, QueryResult};

use super::collection::OutputCollection;
use super::fetcher::{FeatureFetcher, FetchResult};
use super::state::FetchState;

/// Progress callback for fetch passes.
///
/// # Arguments
///
/// * `completed` - Requests fetched successfully so far
/// * `total` - Total number of requests
pub type FetchProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Strategy for fetching a set of requests.
pub trait FetchStrategy: Send + Sync {
    /// Fetches the requests at `indices`, recording outcomes in `state`.
    fn execute(
        &self,
        state: &mut FetchState,
        indices: &[usize],
        fetcher: &FeatureFetcher<'_>,
        collection: &OutputCollection,
        on_progress: Option<&Arc<FetchProgressCallback>>,
    );
}

fn record(state: &mut FetchState, index: usize, outcome: QueryResult<FetchResult>) {
    match outcome {
        Ok(result) => state.record_success(&result),
        Err(e) => {
            warn!(request = %state.requests[index].key, error = %e, "Request failed");
            state.record_failure(index, e.to_string());
        }
    }
}

/// One request at a time, in order.
#[derive(Debug, Default)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl FetchStrategy for SequentialStrategy {
    fn execute(
        &self,
        state: &mut FetchState,
        indices: &[usize],
        fetcher: &FeatureFetcher<'_>,
        collection: &OutputCollection,
        on_progress: Option<&Arc<FetchProgressCallback>>,
    ) {
        let total = state.total();

        for &index in indices {
            let request = &state.requests[index];
            info!(
                "Submitting {} of {} ({} estimated features)",
                request.key, total, request.count
            );

            let outcome = fetcher.fetch(request, collection);
            record(state, index, outcome);

            if let Some(cb) = on_progress {
                cb(state.completed, total);
            }
        }
    }
}

/// Bounded batches of concurrent requests.
#[derive(Debug)]
pub struct ParallelStrategy {
    /// Maximum number of requests in flight.
    pub concurrency: usize,
}

impl ParallelStrategy {
    /// Creates a parallel strategy (minimum concurrency 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for ParallelStrategy {
    fn default() -> Self {
        Self::new(4)
    }
}

impl FetchStrategy for ParallelStrategy {
    fn execute(
        &self,
        state: &mut FetchState,
        indices: &[usize],
        fetcher: &FeatureFetcher<'_>,
        collection: &OutputCollection,
        on_progress: Option<&Arc<FetchProgressCallback>>,
    ) {
        let total = state.total();

        for batch in indices.chunks(self.concurrency) {
            info!(
                "Submitting {} requests ({} to {} of {})",
                batch.len(),
                state.requests[batch[0]].key,
                state.requests[batch[batch.len() - 1]].key,
                total
            );

            let requests = &state.requests;
            let outcomes: Vec<(usize, QueryResult<FetchResult>)> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|&index| {
                        let request = &requests[index];
                        (index, scope.spawn(move || fetcher.fetch(request, collection)))
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|(index, handle)| {
                        let outcome = handle.join().unwrap_or_else(|_| {
                            Err(QueryError::InvalidResponse("fetch worker panicked".to_string()))
                        });
                        (index, outcome)
                    })
                    .collect()
            });

            for (index, outcome) in outcomes {
                record(state, index, outcome);
            }

            if let Some(cb) = on_progress {
                cb(state.completed, total);
            }
        }
    }
}
