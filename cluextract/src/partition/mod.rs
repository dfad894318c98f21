//! Extent partitioning.
//!
//! Turns an area of interest into [`AcceptedRequest`]s whose feature counts
//! fit the service's record limit.

mod partitioner;
mod region;

pub use partitioner::{
    PartitionConfig, PartitionError, Partitioner, DEFAULT_MAX_DEPTH, DEFAULT_MAX_RECYCLES,
    DEFAULT_SPLIT_MARGIN,
};
pub use region::{
    AbandonReason, AbandonedRegion, AcceptedRequest, CandidateRegion, Partition, RequestKey,
};
