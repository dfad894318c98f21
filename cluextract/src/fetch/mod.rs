//! Feature fetching for accepted requests.
//!
//! # Architecture
//!
//! ```text
//! FetchOrchestrator
//!         │
//!         ├── FetchStrategy (trait)
//!         │       ├── SequentialStrategy
//!         │       └── ParallelStrategy
//!         │
//!         ├── FeatureFetcher (one request -> OutputCollection)
//!         │
//!         └── FetchState (completed / failed requests)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cluextract::fetch::{FeatureFetcher, FetchOrchestrator, FetchState, OutputCollection};
//!
//! let fetcher = FeatureFetcher::new(&layer, &schema);
//! let collection = OutputCollection::new();
//! let mut state = FetchState::new(partition.accepted);
//!
//! let orchestrator = FetchOrchestrator::new(1);
//! orchestrator.fetch_all(&mut state, &fetcher, &collection, None);
//! let failed = orchestrator.retry_failed(&mut state, &fetcher, &collection, None);
//! ```

mod collection;
mod dates;
mod fetcher;
mod orchestrator;
mod state;
mod strategy;

pub use collection::OutputCollection;
pub use dates::{DateFormat, DEFAULT_DATE_FORMAT};
pub use fetcher::{FeatureFetcher, FetchResult, DEFAULT_IDENTIFIER_FIELD};
pub use orchestrator::FetchOrchestrator;
pub use state::{FailedRequest, FetchState};
pub use strategy::{FetchProgressCallback, FetchStrategy, ParallelStrategy, SequentialStrategy};
