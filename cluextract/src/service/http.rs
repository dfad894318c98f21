//! HTTP client abstraction for testability

use std::time::Duration;

use super::error::QueryError;

/// Default timeout for a single HTTP request in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP POST with a form-encoded body.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `form` - Name/value pairs sent as `application/x-www-form-urlencoded`
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Vec<u8>, QueryError>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, QueryError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, QueryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("cluextract/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QueryError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Vec<u8>, QueryError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .map_err(|e| QueryError::Http(format!("Request failed: {}", e)))?;

        // Check HTTP status
        if !response.status().is_success() {
            return Err(QueryError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| QueryError::Http(format!("Failed to read response: {}", e)))
    }
}

impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Vec<u8>, QueryError> {
        (**self).post_form(url, form)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// A request captured by [`MockHttpClient`].
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub url: String,
        pub form: Vec<(String, String)>,
    }

    impl RecordedRequest {
        /// Value of a form field, if sent.
        pub fn param(&self, name: &str) -> Option<&str> {
            self.form
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Mock HTTP client that replays scripted responses in order.
    #[derive(Default)]
    pub struct MockHttpClient {
        responses: Mutex<VecDeque<Result<Vec<u8>, QueryError>>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockHttpClient {
        /// Creates a client that answers with `responses`, one per call.
        pub fn scripted(responses: Vec<Result<Vec<u8>, QueryError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Creates a client whose responses are the given JSON bodies.
        pub fn with_json(bodies: &[&str]) -> Self {
            Self::scripted(bodies.iter().map(|b| Ok(b.as_bytes().to_vec())).collect())
        }

        /// Requests received so far.
        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().clone()
        }
    }

    impl HttpClient for MockHttpClient {
        fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Vec<u8>, QueryError> {
            self.requests.lock().push(RecordedRequest {
                url: url.to_string(),
                form: form.to_vec(),
            });
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(QueryError::Http("no scripted response".to_string())))
        }
    }

    #[test]
    fn test_mock_client_success() {
        let mock = MockHttpClient::with_json(&[r#"{"count": 4}"#]);

        let result = mock.post_form("http://example.com", &[]);
        assert_eq!(result.unwrap(), br#"{"count": 4}"#.to_vec());
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn test_mock_client_error() {
        let mock = MockHttpClient::scripted(vec![Err(QueryError::Http("Test error".to_string()))]);

        let result = mock.post_form("http://example.com", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mock_client_exhausted_script() {
        let mock = MockHttpClient::default();
        assert!(matches!(
            mock.post_form("http://example.com", &[]),
            Err(QueryError::Http(_))
        ));
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::with_timeout(5).is_ok());
    }
}
