//! Progress and failure tracking for a fetch run.

use crate::partition::{AcceptedRequest, RequestKey};

use super::fetcher::FetchResult;

/// A request whose fetch failed, with the last error message.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRequest {
    pub index: usize,
    pub key: RequestKey,
    pub reason: String,
}

/// State of fetching a set of accepted requests.
#[derive(Debug, Clone)]
pub struct FetchState {
    /// Requests to fetch, in submission order.
    pub requests: Vec<AcceptedRequest>,
    /// Number of requests fetched successfully.
    pub completed: usize,
    /// Features added to the output so far.
    pub features_added: usize,
    /// Features skipped as duplicates so far.
    pub duplicates: usize,
    /// Requests whose results were truncated by the service.
    pub truncated: Vec<RequestKey>,
    /// Requests that failed in the most recent pass.
    pub failed: Vec<FailedRequest>,
}

impl FetchState {
    /// Create a new fetch state.
    pub fn new(requests: Vec<AcceptedRequest>) -> Self {
        Self {
            requests,
            completed: 0,
            features_added: 0,
            duplicates: 0,
            truncated: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.requests.len()
    }

    /// Every request fetched and none failed.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total() && self.failed.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// Keys of the requests currently marked failed.
    #[cfg(test)]
    pub(crate) fn failed_keys(&self) -> Vec<RequestKey> {
        self.failed.iter().map(|f| f.key).collect()
    }

    /// Record a successful fetch.
    pub fn record_success(&mut self, result: &FetchResult) {
        self.completed += 1;
        self.features_added += result.added.len();
        self.duplicates += result.duplicates;
        if result.truncated {
            self.truncated.push(result.key);
        }
    }

    /// Record a failed fetch of the request at `index`.
    pub fn record_failure(&mut self, index: usize, reason: impl Into<String>) {
        if let Some(request) = self.requests.get(index) {
            self.failed.push(FailedRequest {
                index,
                key: request.key,
                reason: reason.into(),
            });
        }
    }

    /// Take the failed requests for a retry pass, clearing the list.
    pub fn take_failures(&mut self) -> Vec<FailedRequest> {
        std::mem::take(&mut self.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::MultiPolygon;

    fn requests(n: u64) -> Vec<AcceptedRequest> {
        (1..=n)
            .map(|i| AcceptedRequest {
                key: RequestKey(i),
                geometry: MultiPolygon::new(vec![]),
                count: 0,
            })
            .collect()
    }

    fn result(key: u64, added: usize) -> FetchResult {
        FetchResult {
            key: RequestKey(key),
            added: (0..added).map(|i| format!("id-{}", i)).collect(),
            duplicates: 1,
            without_geometry: 0,
            truncated: false,
        }
    }

    #[test]
    fn test_fetch_state_new() {
        let state = FetchState::new(requests(2));
        assert_eq!(state.total(), 2);
        assert!(!state.is_complete());
        assert_eq!(state.completed, 0);
    }

    #[test]
    fn test_record_success_and_failure() {
        let mut state = FetchState::new(requests(2));

        state.record_success(&result(1, 3));
        assert_eq!(state.features_added, 3);
        assert_eq!(state.duplicates, 1);
        assert_eq!(state.completed, 1);

        state.record_failure(1, "timeout");
        assert!(state.has_failures());
        assert_eq!(state.failed_keys(), vec![RequestKey(2)]);
        assert!(!state.is_complete());
    }

    #[test]
    fn test_take_failures_clears_list() {
        let mut state = FetchState::new(requests(3));
        state.record_failure(0, "a");
        state.record_failure(2, "b");

        let failures = state.take_failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[1].index, 2);
        assert!(!state.has_failures());
    }

    #[test]
    fn test_empty_state_is_complete() {
        let state = FetchState::new(Vec::new());
        assert!(state.is_complete());
    }
}
