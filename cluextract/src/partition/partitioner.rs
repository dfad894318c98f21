//! Adaptive request splitting.
//!
//! The partitioner asks the service how many features fall inside a region
//! and keeps cutting regions until every fragment fits under the record
//! limit. Work is processed breadth-first from a FIFO queue:
//!
//! ```text
//!            ┌──────────── split in 2 ◄──── over limit ────┐
//!            ▼                                             │
//! queue ──► fragment ──► estimate ──► within limit ──► accepted
//!            ▲               │
//!            └── split in 2 ◄┴─ estimate failed
//! ```
//!
//! The first cut of the whole AOI uses `count / split_margin` parts so large
//! areas converge in one step; every later cut is a bisection.

use std::collections::VecDeque;
use std::thread;

use geo::MultiPolygon;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::geometry::{Subdivide, SubdivisionStrategy};
use crate::service::{QueryError, QueryResult, RetryPolicy};

use super::region::{
    AbandonReason, AbandonedRegion, AcceptedRequest, CandidateRegion, Partition, RequestKey,
};

/// Default divisor for the first split factor.
pub const DEFAULT_SPLIT_MARGIN: u64 = 800;

/// Default maximum number of splits between the AOI and a fragment.
pub const DEFAULT_MAX_DEPTH: u32 = 24;

/// Default number of times a lineage may be re-split after failed estimates.
pub const DEFAULT_MAX_RECYCLES: u32 = 3;

/// Errors that stop partitioning.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// The count for the whole AOI could not be obtained.
    #[error("could not estimate features in the area of interest: {0}")]
    Estimate(#[source] QueryError),

    /// Every fragment was abandoned.
    #[error("no requests determined")]
    NoRequests { abandoned: usize },

    /// The record limit was zero.
    #[error("record limit must be at least 1")]
    InvalidLimit,
}

/// Partitioner settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionConfig {
    /// Divisor for the first split factor (`count / split_margin`).
    pub split_margin: u64,
    /// Fragments still over the limit at this depth are abandoned.
    pub max_depth: u32,
    /// Lineages whose estimates failed this many times are abandoned.
    pub max_recycles: u32,
    /// Retry applied to each estimate before it counts as failed.
    pub retry: RetryPolicy,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            split_margin: DEFAULT_SPLIT_MARGIN,
            max_depth: DEFAULT_MAX_DEPTH,
            max_recycles: DEFAULT_MAX_RECYCLES,
            retry: RetryPolicy::default(),
        }
    }
}

impl PartitionConfig {
    /// Number of parts for the first split of an AOI with `count` features.
    pub fn initial_parts(&self, count: u64) -> usize {
        let parts = count / self.split_margin.max(1);
        usize::try_from(parts).unwrap_or(usize::MAX).max(2)
    }
}

/// Splits an AOI into requests that fit the record limit.
pub struct Partitioner {
    config: PartitionConfig,
    subdivider: Box<dyn Subdivide>,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self::new(PartitionConfig::default(), SubdivisionStrategy::default())
    }
}

impl Partitioner {
    /// Creates a partitioner using a built-in subdivision strategy.
    pub fn new(config: PartitionConfig, strategy: SubdivisionStrategy) -> Self {
        Self::with_subdivider(config, strategy.subdivider())
    }

    /// Creates a partitioner with a custom subdivider.
    pub fn with_subdivider(config: PartitionConfig, subdivider: Box<dyn Subdivide>) -> Self {
        Self { config, subdivider }
    }

    /// The settings in use.
    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Partitions `aoi` so every accepted request's count is at most `limit`.
    ///
    /// `estimator` returns the feature count for a region. Failing estimates
    /// for the whole AOI end the run; failing estimates for fragments send
    /// them back to the queue as two halves until `max_recycles` is reached.
    ///
    /// # Errors
    ///
    /// * [`PartitionError::Estimate`] if the AOI itself cannot be counted
    /// * [`PartitionError::NoRequests`] if nothing was accepted
    pub fn partition<E>(
        &self,
        aoi: &MultiPolygon<f64>,
        limit: u64,
        estimator: E,
    ) -> Result<Partition, PartitionError>
    where
        E: Fn(&MultiPolygon<f64>) -> QueryResult<u64>,
    {
        if limit == 0 {
            return Err(PartitionError::InvalidLimit);
        }

        let total = self
            .estimate(aoi, &estimator)
            .map_err(PartitionError::Estimate)?;
        info!(count = total, limit, "Estimated features in area of interest");

        let mut partition = Partition::default();
        let mut next_key = 0u64;
        let root = CandidateRegion::root(aoi.clone());

        if total <= limit {
            accept(&mut partition, &mut next_key, root, total);
            return Ok(partition);
        }

        let parts = self.config.initial_parts(total);
        info!(
            parts,
            strategy = self.subdivider.name(),
            "Splitting area of interest"
        );
        let mut queue: VecDeque<CandidateRegion> = self.split(&root, parts, false);

        while let Some(region) = queue.pop_front() {
            match self.estimate(&region.geometry, &estimator) {
                Ok(count) if count <= limit => {
                    accept(&mut partition, &mut next_key, region, count);
                }
                Ok(count) if region.depth >= self.config.max_depth => {
                    warn!(count, depth = region.depth, "Abandoning fragment at maximum depth");
                    partition.abandoned.push(AbandonedRegion {
                        geometry: region.geometry,
                        reason: AbandonReason::DepthExceeded { count },
                    });
                }
                Ok(count) => {
                    debug!(count, depth = region.depth, "Fragment over limit, splitting");
                    queue.extend(self.split(&region, 2, false));
                }
                Err(e) if region.recycles >= self.config.max_recycles => {
                    warn!(error = %e, "Abandoning fragment after repeated failures");
                    partition.abandoned.push(AbandonedRegion {
                        geometry: region.geometry,
                        reason: AbandonReason::EstimateFailed(e.to_string()),
                    });
                }
                Err(e) => {
                    warn!(error = %e, recycles = region.recycles + 1, "Count failed, re-splitting fragment");
                    queue.extend(self.split(&region, 2, true));
                }
            }
        }

        if partition.accepted.is_empty() {
            return Err(PartitionError::NoRequests {
                abandoned: partition.abandoned.len(),
            });
        }

        info!(
            requests = partition.accepted.len(),
            abandoned = partition.abandoned.len(),
            "Determined requests"
        );
        Ok(partition)
    }

    fn estimate<E>(&self, region: &MultiPolygon<f64>, estimator: &E) -> QueryResult<u64>
    where
        E: Fn(&MultiPolygon<f64>) -> QueryResult<u64>,
    {
        let mut attempt = 1;
        loop {
            match estimator(region) {
                Ok(count) => return Ok(count),
                Err(e) => match self.config.retry.delay_for_attempt(attempt) {
                    Some(delay) => {
                        debug!(error = %e, attempt, "Count failed, retrying");
                        thread::sleep(delay);
                        attempt += 1;
                    }
                    None => return Err(e),
                },
            }
        }
    }

    fn split(
        &self,
        region: &CandidateRegion,
        parts: usize,
        recycled: bool,
    ) -> VecDeque<CandidateRegion> {
        self.subdivider
            .subdivide(&region.geometry, parts)
            .into_iter()
            .map(|fragment| region.child(fragment, recycled))
            .collect()
    }
}

fn accept(partition: &mut Partition, next_key: &mut u64, region: CandidateRegion, count: u64) {
    *next_key += 1;
    let key = RequestKey(*next_key);
    debug!(%key, count, depth = region.depth, "Accepted request");
    partition.accepted.push(AcceptedRequest {
        key,
        geometry: region.geometry,
        count,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GridSubdivider;
    use geo::{coord, Area, BooleanOps, Intersects, Point, Rect};
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::time::Duration;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()])
    }

    fn config() -> PartitionConfig {
        PartitionConfig {
            retry: RetryPolicy::retry_once(Duration::ZERO),
            ..PartitionConfig::default()
        }
    }

    /// Subdivider that records the part counts it was asked for.
    struct Recording {
        inner: GridSubdivider,
        calls: Arc<Mutex<Vec<usize>>>,
    }

    impl Subdivide for Recording {
        fn subdivide(&self, region: &MultiPolygon<f64>, parts: usize) -> Vec<MultiPolygon<f64>> {
            self.calls.lock().push(parts);
            self.inner.subdivide(region, parts)
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn recording(config: PartitionConfig) -> (Partitioner, Arc<Mutex<Vec<usize>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let subdivider = Recording {
            inner: GridSubdivider,
            calls: Arc::clone(&calls),
        };
        (Partitioner::with_subdivider(config, Box::new(subdivider)), calls)
    }

    fn unavailable() -> QueryError {
        QueryError::Service {
            code: 500,
            message: "Unable to complete operation.".to_string(),
        }
    }

    #[test]
    fn test_initial_parts() {
        let config = PartitionConfig::default();
        assert_eq!(config.initial_parts(2400), 3);
        assert_eq!(config.initial_parts(1001), 2);
        assert_eq!(config.initial_parts(16_000), 20);
    }

    #[test]
    fn test_small_aoi_is_single_request() {
        let aoi = rect(0.0, 0.0, 1.0, 1.0);
        let partition = Partitioner::new(config(), SubdivisionStrategy::Grid)
            .partition(&aoi, 1000, |_| Ok(500))
            .unwrap();

        assert_eq!(partition.accepted.len(), 1);
        assert_eq!(partition.accepted[0].key, RequestKey(1));
        assert_eq!(partition.accepted[0].geometry, aoi);
        assert_eq!(partition.accepted[0].count, 500);
        assert!(partition.abandoned.is_empty());
    }

    #[test]
    fn test_zero_count_is_accepted() {
        let aoi = rect(0.0, 0.0, 1.0, 1.0);
        let partition = Partitioner::default().partition(&aoi, 1000, |_| Ok(0)).unwrap();
        assert_eq!(partition.accepted.len(), 1);
    }

    #[test]
    fn test_first_split_uses_margin_then_halves() {
        // 1600 features per unit area in x < 1, 400 elsewhere: 2400 in total.
        let aoi = rect(0.0, 0.0, 3.0, 1.0);
        let dense = rect(0.0, 0.0, 1.0, 1.0);
        let estimator = |region: &MultiPolygon<f64>| {
            let inside = region.intersection(&dense).unsigned_area();
            Ok((inside * 1200.0 + region.unsigned_area() * 400.0).round() as u64)
        };

        let (partitioner, calls) = recording(config());
        let partition = partitioner.partition(&aoi, 1000, estimator).unwrap();

        assert_eq!(*calls.lock(), vec![3, 2]);
        assert_eq!(partition.accepted.len(), 4);
        assert!(partition.accepted.iter().all(|r| r.count <= 1000));
        assert_eq!(partition.estimated_features(), 2400);

        let keys: Vec<String> = partition.accepted.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, vec!["request_1", "request_2", "request_3", "request_4"]);
    }

    #[test]
    fn test_aoi_estimate_failure_is_fatal() {
        let aoi = rect(0.0, 0.0, 1.0, 1.0);
        let calls = Cell::new(0);
        let result = Partitioner::default().partition(&aoi, 1000, |_| {
            calls.set(calls.get() + 1);
            Err(unavailable())
        });

        assert!(matches!(result, Err(PartitionError::Estimate(_))));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_aoi_estimate_retried_once() {
        let aoi = rect(0.0, 0.0, 1.0, 1.0);
        let calls = Cell::new(0);
        let partition = Partitioner::new(config(), SubdivisionStrategy::Grid)
            .partition(&aoi, 1000, |_| {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err(unavailable())
                } else {
                    Ok(10)
                }
            })
            .unwrap();

        assert_eq!(partition.accepted.len(), 1);
    }

    #[test]
    fn test_failing_fragments_terminate_with_no_requests() {
        let aoi = rect(0.0, 0.0, 4.0, 1.0);
        let whole_area = aoi.unsigned_area();
        let mut config = config();
        config.max_recycles = 2;

        let result = Partitioner::new(config, SubdivisionStrategy::Grid).partition(
            &aoi,
            1000,
            |region| {
                if (region.unsigned_area() - whole_area).abs() < 1e-9 {
                    Ok(1600)
                } else {
                    Err(unavailable())
                }
            },
        );

        // 2 fragments, each recycled twice into halves: 2 * 2 * 2 abandoned.
        match result {
            Err(PartitionError::NoRequests { abandoned }) => assert_eq!(abandoned, 8),
            other => panic!("expected NoRequests, got {:?}", other),
        }
    }

    #[test]
    fn test_recycled_fragment_recovers() {
        let aoi = rect(0.0, 0.0, 2.0, 1.0);
        let calls = Cell::new(0);
        let (partitioner, split_calls) = recording(config());

        // Call 1: AOI. Calls 2-3: first fragment fails twice. Everything after succeeds.
        let partition = partitioner
            .partition(&aoi, 1000, |region| {
                calls.set(calls.get() + 1);
                match calls.get() {
                    1 => Ok(1600),
                    2 | 3 => Err(unavailable()),
                    _ => Ok((region.unsigned_area() * 400.0).round() as u64),
                }
            })
            .unwrap();

        assert_eq!(*split_calls.lock(), vec![2, 2]);
        assert_eq!(partition.accepted.len(), 3);
        assert!(partition.abandoned.is_empty());
        let area: f64 = partition.accepted.iter().map(|r| r.geometry.unsigned_area()).sum();
        assert!((area - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_depth_limit_abandons_dense_fragments() {
        let aoi = rect(0.0, 0.0, 1.0, 1.0);
        let mut config = config();
        config.max_depth = 3;

        let result = Partitioner::new(config, SubdivisionStrategy::Grid).partition(&aoi, 1000, |_| Ok(5000));

        // 6 first-level fragments, each halved twice more.
        match result {
            Err(PartitionError::NoRequests { abandoned }) => assert_eq!(abandoned, 24),
            other => panic!("expected NoRequests, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_limit_rejected() {
        let aoi = rect(0.0, 0.0, 1.0, 1.0);
        assert!(matches!(
            Partitioner::default().partition(&aoi, 0, |_| Ok(1)),
            Err(PartitionError::InvalidLimit)
        ));
    }

    fn point_estimator(points: Vec<Point<f64>>) -> impl Fn(&MultiPolygon<f64>) -> QueryResult<u64> {
        move |region| Ok(points.iter().filter(|p| region.intersects(*p)).count() as u64)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_requests_fit_limit_and_cover_aoi(
            coords in prop::collection::vec((0.0f64..10.0, 0.0f64..4.0), 1..120),
            limit in 5u64..60,
            grid in any::<bool>(),
        ) {
            let aoi = rect(0.0, 0.0, 10.0, 4.0);
            let points: Vec<Point<f64>> = coords.into_iter().map(Point::from).collect();
            let strategy = if grid { SubdivisionStrategy::Grid } else { SubdivisionStrategy::EqualArea };
            let mut config = config();
            config.split_margin = 10;

            let partition = Partitioner::new(config, strategy)
                .partition(&aoi, limit, point_estimator(points))
                .unwrap();

            for request in &partition.accepted {
                prop_assert!(request.count <= limit);
            }

            let covered: f64 = partition.accepted.iter().map(|r| r.geometry.unsigned_area())
                .chain(partition.abandoned.iter().map(|r| r.geometry.unsigned_area()))
                .sum();
            prop_assert!((covered - aoi.unsigned_area()).abs() < 1e-6);
        }
    }
}
