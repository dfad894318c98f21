//! Partition work items and results.

use std::fmt;

use geo::MultiPolygon;

/// Key identifying an accepted request (`request_1`, `request_2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(pub u64);

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request_{}", self.0)
    }
}

/// A fragment waiting in the partition queue.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRegion {
    pub geometry: MultiPolygon<f64>,
    /// Number of splits between the AOI and this fragment.
    pub depth: u32,
    /// Times this lineage was re-queued after estimation failed.
    pub recycles: u32,
}

impl CandidateRegion {
    /// The whole AOI, before any split.
    pub fn root(geometry: MultiPolygon<f64>) -> Self {
        Self {
            geometry,
            depth: 0,
            recycles: 0,
        }
    }

    /// A fragment produced by splitting this region.
    pub fn child(&self, geometry: MultiPolygon<f64>, recycled: bool) -> Self {
        Self {
            geometry,
            depth: self.depth + 1,
            recycles: self.recycles + u32::from(recycled),
        }
    }
}

/// A fragment whose estimated count fits the record limit.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedRequest {
    pub key: RequestKey,
    pub geometry: MultiPolygon<f64>,
    /// Count reported by the service when the fragment was accepted.
    pub count: u64,
}

/// Why a fragment was given up on.
#[derive(Debug, Clone, PartialEq)]
pub enum AbandonReason {
    /// Count estimation kept failing after repeated re-splits.
    EstimateFailed(String),
    /// Still over the limit at the maximum split depth.
    DepthExceeded { count: u64 },
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbandonReason::EstimateFailed(reason) => write!(f, "count estimate failed: {}", reason),
            AbandonReason::DepthExceeded { count } => {
                write!(f, "still {} features at maximum split depth", count)
            }
        }
    }
}

/// A fragment the partitioner could not turn into a request.
#[derive(Debug, Clone, PartialEq)]
pub struct AbandonedRegion {
    pub geometry: MultiPolygon<f64>,
    pub reason: AbandonReason,
}

/// Outcome of partitioning an AOI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Requests in acceptance order.
    pub accepted: Vec<AcceptedRequest>,
    pub abandoned: Vec<AbandonedRegion>,
}

impl Partition {
    /// Sum of the accepted counts.
    pub fn estimated_features(&self) -> u64 {
        self.accepted.iter().map(|r| r.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ]])
    }

    #[test]
    fn test_request_key_display() {
        assert_eq!(RequestKey(3).to_string(), "request_3");
    }

    #[test]
    fn test_child_tracks_depth_and_recycles() {
        let root = CandidateRegion::root(square());
        let split = root.child(square(), false);
        assert_eq!((split.depth, split.recycles), (1, 0));

        let recycled = split.child(square(), true);
        assert_eq!((recycled.depth, recycled.recycles), (2, 1));
    }

    #[test]
    fn test_abandon_reason_display() {
        let reason = AbandonReason::DepthExceeded { count: 1500 };
        assert!(reason.to_string().contains("1500"));
    }
}
