//! The remote query primitive.
//!
//! [`QueryClient::query`] sends one form-encoded request and climbs a fixed
//! retry ladder when it fails:
//!
//! ```text
//! send ──ok──► result
//!   │
//!   ├─ token rejected ──► regenerate token ──► send again
//!   │
//!   └─ still failing (error / empty / transport) ──► wait ──► send again ──► give up
//! ```

use std::thread;

use serde_json::Value;
use tracing::{debug, warn};

use super::auth::Credentials;
use super::error::{QueryError, QueryResult};
use super::http::HttpClient;
use super::policy::RetryPolicy;

/// Ordered form parameters for a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Creates parameters with `f=json` already set.
    pub fn json() -> Self {
        Self::default().with("f", "json")
    }

    /// Adds or replaces a parameter.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Adds or replaces a parameter in place.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k == name) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((name.to_string(), value)),
        }
    }

    /// Value of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parameters as name/value pairs.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Sends queries with the shared credentials and retry ladder.
pub struct QueryClient<C: HttpClient> {
    http: C,
    credentials: Credentials,
    retry: RetryPolicy,
}

impl<C: HttpClient> QueryClient<C> {
    /// Creates a client with the default retry policy (one retry after 5s).
    pub fn new(http: C, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the retry policy for non-credential failures.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The credentials used by this client.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[cfg(test)]
    pub(crate) fn http(&self) -> &C {
        &self.http
    }

    /// Sends a query and returns the parsed JSON object.
    ///
    /// A rejected token is regenerated once and the same query resent. Any
    /// other failure (error object, empty object, unreadable body, transport
    /// error) is retried according to the retry policy. When the ladder is
    /// exhausted the last failure is returned as [`QueryError::Exhausted`].
    /// Failure to regenerate a token is returned as [`QueryError::Credential`].
    pub fn query(&self, url: &str, params: &QueryParams) -> QueryResult<Value> {
        let mut token = self.credentials.token()?;
        let mut attempts = 1;
        let mut outcome = self.send(url, params, token.as_deref());

        if matches!(&outcome, Err(e) if e.is_token_error()) {
            warn!(url, "Service rejected token");
            token = self.credentials.refresh(token.as_deref())?;
            attempts += 1;
            outcome = self.send(url, params, token.as_deref());
        }

        let mut retry = 1;
        loop {
            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let Some(delay) = self.retry.delay_for_attempt(retry) else {
                return Err(QueryError::Exhausted {
                    url: url.to_string(),
                    attempts,
                    reason: error.to_string(),
                });
            };

            warn!(url, error = %error, delay_secs = delay.as_secs_f32(), "Query failed, retrying");
            thread::sleep(delay);
            retry += 1;
            attempts += 1;

            let token = self.credentials.token()?;
            outcome = self.send(url, params, token.as_deref());
        }
    }

    fn send(&self, url: &str, params: &QueryParams, token: Option<&str>) -> QueryResult<Value> {
        let mut form = params.clone();
        if let Some(token) = token {
            form.set("token", token);
        }

        debug!(url, params = ?redacted(params), "Submitting query");
        let body = self.http.post_form(url, form.pairs())?;
        parse_response(&body)
    }
}

/// Parameter names for debug logs; geometry payloads are too long to print.
fn redacted(params: &QueryParams) -> Vec<(&str, &str)> {
    params
        .pairs()
        .iter()
        .map(|(k, v)| {
            if k == "geometry" {
                (k.as_str(), "<geometry>")
            } else {
                (k.as_str(), v.as_str())
            }
        })
        .collect()
}

/// Parses a response body, mapping service error objects to errors.
pub(crate) fn parse_response(body: &[u8]) -> QueryResult<Value> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| QueryError::InvalidResponse(format!("not JSON: {}", e)))?;

    let Value::Object(map) = &value else {
        return Err(QueryError::InvalidResponse(
            "expected a JSON object".to_string(),
        ));
    };

    if map.is_empty() {
        return Err(QueryError::EmptyResponse);
    }

    if let Some(error) = map.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(QueryError::Service { code, message });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::auth::{StaticToken, TokenProvider};
    use crate::service::http::tests::MockHttpClient;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const INVALID_TOKEN: &str =
        r#"{"error":{"code":498,"message":"Invalid Token","details":[]}}"#;
    const SERVER_ERROR: &str =
        r#"{"error":{"code":500,"message":"Unable to complete operation.","details":[]}}"#;

    struct RotatingProvider {
        calls: AtomicU32,
    }

    impl TokenProvider for RotatingProvider {
        fn generate(&self) -> QueryResult<Option<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(format!("t{}", n)))
        }

        fn name(&self) -> &str {
            "rotating"
        }
    }

    fn client(mock: MockHttpClient) -> QueryClient<MockHttpClient> {
        let credentials = Credentials::new(Box::new(RotatingProvider {
            calls: AtomicU32::new(0),
        }));
        QueryClient::new(mock, credentials)
            .with_retry_policy(RetryPolicy::retry_once(Duration::ZERO))
    }

    #[test]
    fn test_params_replace_existing_value() {
        let params = QueryParams::json().with("token", "a").with("token", "b");
        assert_eq!(params.get("token"), Some("b"));
        assert_eq!(params.pairs().len(), 2);
    }

    #[test]
    fn test_parse_response_variants() {
        assert!(parse_response(br#"{"count": 3}"#).is_ok());
        assert_eq!(parse_response(b"{}"), Err(QueryError::EmptyResponse));
        assert!(matches!(
            parse_response(b"<html>"),
            Err(QueryError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(b"[1,2]"),
            Err(QueryError::InvalidResponse(_))
        ));
        assert_eq!(
            parse_response(SERVER_ERROR.as_bytes()),
            Err(QueryError::Service {
                code: 500,
                message: "Unable to complete operation.".to_string()
            })
        );
    }

    #[test]
    fn test_query_success_sends_token() {
        let qc = client(MockHttpClient::with_json(&[r#"{"count": 12}"#]));

        let value = qc.query("https://svc/query", &QueryParams::json()).unwrap();
        assert_eq!(value["count"], 12);

        let requests = qc.http.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].param("token"), Some("t1"));
        assert_eq!(requests[0].param("f"), Some("json"));
    }

    #[test]
    fn test_invalid_token_regenerates_and_resends() {
        let qc = client(MockHttpClient::with_json(&[INVALID_TOKEN, r#"{"count": 7}"#]));

        let value = qc.query("https://svc/query", &QueryParams::json()).unwrap();
        assert_eq!(value["count"], 7);

        let requests = qc.http.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].param("token"), Some("t1"));
        assert_eq!(requests[1].param("token"), Some("t2"));
    }

    #[test]
    fn test_error_response_retried_once() {
        let qc = client(MockHttpClient::with_json(&[SERVER_ERROR, r#"{"count": 1}"#]));

        let value = qc.query("https://svc/query", &QueryParams::json()).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(qc.http.requests().len(), 2);
    }

    #[test]
    fn test_empty_response_retried_once() {
        let qc = client(MockHttpClient::with_json(&["{}", r#"{"count": 2}"#]));
        assert_eq!(
            qc.query("https://svc/query", &QueryParams::json()).unwrap()["count"],
            2
        );
    }

    #[test]
    fn test_transport_error_retried_once() {
        let qc = client(MockHttpClient::scripted(vec![
            Err(QueryError::Http("connection reset".to_string())),
            Ok(br#"{"count": 5}"#.to_vec()),
        ]));
        assert_eq!(
            qc.query("https://svc/query", &QueryParams::json()).unwrap()["count"],
            5
        );
    }

    #[test]
    fn test_two_failures_exhaust_ladder() {
        let qc = client(MockHttpClient::with_json(&[SERVER_ERROR, "{}"]));

        let err = qc.query("https://svc/query", &QueryParams::json()).unwrap_err();
        match err {
            QueryError::Exhausted { attempts, reason, .. } => {
                assert_eq!(attempts, 2);
                assert!(reason.contains("empty"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert_eq!(qc.http.requests().len(), 2);
    }

    #[test]
    fn test_token_refresh_then_failure_then_retry() {
        let qc = client(MockHttpClient::with_json(&[
            INVALID_TOKEN,
            SERVER_ERROR,
            r#"{"count": 9}"#,
        ]));

        let value = qc.query("https://svc/query", &QueryParams::json()).unwrap();
        assert_eq!(value["count"], 9);

        let requests = qc.http.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].param("token"), Some("t2"));
    }

    #[test]
    fn test_token_refresh_then_two_failures_is_exhausted_after_three_attempts() {
        let qc = client(MockHttpClient::with_json(&[INVALID_TOKEN, SERVER_ERROR, SERVER_ERROR]));

        let err = qc.query("https://svc/query", &QueryParams::json()).unwrap_err();
        assert!(matches!(err, QueryError::Exhausted { attempts: 3, .. }));
    }

    #[test]
    fn test_anonymous_credentials_send_no_token() {
        let qc = QueryClient::new(
            MockHttpClient::with_json(&[r#"{"count": 0}"#]),
            Credentials::new(Box::new(StaticToken::anonymous())),
        );

        qc.query("https://svc/query", &QueryParams::json()).unwrap();
        assert_eq!(qc.http.requests()[0].param("token"), None);
    }

    #[test]
    fn test_credential_failure_surfaces() {
        struct Failing;
        impl TokenProvider for Failing {
            fn generate(&self) -> QueryResult<Option<String>> {
                Err(QueryError::Credential("not signed in".to_string()))
            }
            fn name(&self) -> &str {
                "failing"
            }
        }

        let qc = QueryClient::new(
            MockHttpClient::default(),
            Credentials::new(Box::new(Failing)),
        );
        let err = qc.query("https://svc/query", &QueryParams::json()).unwrap_err();
        assert!(matches!(err, QueryError::Credential(_)));
        assert!(qc.http.requests().is_empty());
    }
}
