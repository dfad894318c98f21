//! The deduplicated output collection.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::output::OutputFeature;

#[derive(Debug, Default)]
struct Inner {
    seen: HashSet<String>,
    features: Vec<OutputFeature>,
}

/// Features gathered across all requests, each identifier at most once.
///
/// The identifier check and the append happen under the same lock, so
/// concurrent fetches cannot both add the same feature.
#[derive(Debug, Default)]
pub struct OutputCollection {
    inner: Mutex<Inner>,
}

impl OutputCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a feature unless its identifier was already seen.
    ///
    /// Returns `true` if the feature was added.
    pub fn insert(&self, feature: OutputFeature) -> bool {
        let mut inner = self.inner.lock();
        if !inner.seen.insert(feature.id.clone()) {
            return false;
        }
        inner.features.push(feature);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keeps only features matching `keep`. Returns how many were removed.
    ///
    /// Removed identifiers stay in the seen set.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&OutputFeature) -> bool,
    {
        let mut inner = self.inner.lock();
        let before = inner.features.len();
        inner.features.retain(|f| keep(f));
        before - inner.features.len()
    }

    /// Consumes the collection, returning features in insertion order.
    pub fn into_features(self) -> Vec<OutputFeature> {
        self.inner.into_inner().features
    }
}
