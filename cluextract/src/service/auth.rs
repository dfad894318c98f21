//! Credentials for secured feature services.
//!
//! A [`TokenProvider`] knows how to produce a token; [`Credentials`] caches
//! the current one and regenerates it when the service rejects it.

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::error::{QueryError, QueryResult};
use super::http::HttpClient;

/// Default token lifetime requested from a portal, in minutes.
pub const DEFAULT_TOKEN_EXPIRATION_MINUTES: u32 = 60;

/// Source of access tokens.
pub trait TokenProvider: Send + Sync {
    /// Produces a token, or `None` for anonymous access.
    fn generate(&self) -> QueryResult<Option<String>>;

    /// Short description for logs.
    fn name(&self) -> &str;
}

/// A fixed token, or none for public services.
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    /// Uses the given token for every request.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Sends no token at all.
    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticToken {
    fn generate(&self) -> QueryResult<Option<String>> {
        Ok(self.token.clone())
    }

    fn name(&self) -> &str {
        if self.token.is_some() {
            "static token"
        } else {
            "anonymous"
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    error: Option<TokenErrorBody>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Generates tokens from an ArcGIS portal's `generateToken` endpoint.
pub struct PortalTokenProvider<C: HttpClient> {
    http: C,
    endpoint: String,
    username: String,
    password: String,
    referer: String,
}

impl<C: HttpClient> PortalTokenProvider<C> {
    /// Creates a provider for the portal at `portal_url`.
    ///
    /// # Arguments
    ///
    /// * `http` - HTTP client for the token request
    /// * `portal_url` - Portal root, e.g. `https://gis.sc.egov.usda.gov/portal/`
    /// * `username` / `password` - Portal credentials
    /// * `referer` - Referer the token is bound to
    pub fn new(
        http: C,
        portal_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        referer: impl Into<String>,
    ) -> QueryResult<Self> {
        let base = Url::parse(portal_url)
            .map_err(|e| QueryError::Credential(format!("invalid portal URL {}: {}", portal_url, e)))?;
        let endpoint = format!(
            "{}/sharing/rest/generateToken",
            base.as_str().trim_end_matches('/')
        );

        Ok(Self {
            http,
            endpoint,
            username: username.into(),
            password: password.into(),
            referer: referer.into(),
        })
    }

    /// The token endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl<C: HttpClient> TokenProvider for PortalTokenProvider<C> {
    fn generate(&self) -> QueryResult<Option<String>> {
        let form = vec![
            ("username".to_string(), self.username.clone()),
            ("password".to_string(), self.password.clone()),
            ("referer".to_string(), self.referer.clone()),
            ("client".to_string(), "referer".to_string()),
            ("expiration".to_string(), DEFAULT_TOKEN_EXPIRATION_MINUTES.to_string()),
            ("f".to_string(), "json".to_string()),
        ];

        debug!(endpoint = %self.endpoint, user = %self.username, "Requesting portal token");

        let body = self
            .http
            .post_form(&self.endpoint, &form)
            .map_err(|e| QueryError::Credential(e.to_string()))?;
        let response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| QueryError::Credential(format!("unreadable token response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(QueryError::Credential(format!(
                "portal refused token ({}): {}",
                error.code, error.message
            )));
        }

        response
            .token
            .map(Some)
            .ok_or_else(|| QueryError::Credential("token response had no token".to_string()))
    }

    fn name(&self) -> &str {
        "portal token"
    }
}

enum TokenState {
    Unset,
    Ready(Option<String>),
}

/// The token shared by every query of a run.
///
/// The first call to [`Credentials::token`] generates a token; later calls
/// reuse it until [`Credentials::refresh`] replaces it.
pub struct Credentials {
    provider: Box<dyn TokenProvider>,
    state: Mutex<TokenState>,
}

impl Credentials {
    /// Wraps a token provider.
    pub fn new(provider: Box<dyn TokenProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(TokenState::Unset),
        }
    }

    /// Credentials that never send a token.
    pub fn anonymous() -> Self {
        Self::new(Box::new(StaticToken::anonymous()))
    }

    /// Current token, generating one on first use.
    pub fn token(&self) -> QueryResult<Option<String>> {
        let mut state = self.state.lock();
        match &*state {
            TokenState::Ready(token) => Ok(token.clone()),
            TokenState::Unset => {
                let token = self.provider.generate()?;
                *state = TokenState::Ready(token.clone());
                Ok(token)
            }
        }
    }

    /// Replaces a token the service rejected.
    ///
    /// `stale` is the token that was rejected. If another caller already
    /// refreshed it, the newer token is returned without generating again.
    pub fn refresh(&self, stale: Option<&str>) -> QueryResult<Option<String>> {
        let mut state = self.state.lock();
        if let TokenState::Ready(current) = &*state {
            if current.as_deref() != stale {
                return Ok(current.clone());
            }
        }

        info!(provider = self.provider.name(), "Regenerating service token");
        let token = self.provider.generate()?;
        *state = TokenState::Ready(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::http::tests::MockHttpClient;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Provider that hands out `token-1`, `token-2`, ...
    struct CountingProvider {
        calls: AtomicU32,
    }

    impl TokenProvider for CountingProvider {
        fn generate(&self) -> QueryResult<Option<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(format!("token-{}", n)))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn counting() -> Credentials {
        Credentials::new(Box::new(CountingProvider {
            calls: AtomicU32::new(0),
        }))
    }

    #[test]
    fn test_static_token() {
        assert_eq!(
            StaticToken::new("abc").generate().unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(StaticToken::anonymous().generate().unwrap(), None);
    }

    #[test]
    fn test_token_generated_once() {
        let credentials = counting();
        assert_eq!(credentials.token().unwrap(), Some("token-1".to_string()));
        assert_eq!(credentials.token().unwrap(), Some("token-1".to_string()));
    }

    #[test]
    fn test_refresh_replaces_stale_token() {
        let credentials = counting();
        let first = credentials.token().unwrap();

        let fresh = credentials.refresh(first.as_deref()).unwrap();
        assert_eq!(fresh, Some("token-2".to_string()));
        assert_eq!(credentials.token().unwrap(), Some("token-2".to_string()));
    }

    #[test]
    fn test_refresh_skips_when_already_refreshed() {
        let credentials = counting();
        let first = credentials.token().unwrap();
        credentials.refresh(first.as_deref()).unwrap();

        // A second caller still holding token-1 gets token-2 without a new call.
        let again = credentials.refresh(first.as_deref()).unwrap();
        assert_eq!(again, Some("token-2".to_string()));
    }

    #[test]
    fn test_portal_provider_posts_credentials() {
        let mock = MockHttpClient::with_json(&[r#"{"token":"portal-abc","expires":1700000000000}"#]);
        let provider = PortalTokenProvider::new(
            mock,
            "https://gis.example.gov/portal/",
            "jdoe",
            "secret",
            "https://gis.example.gov",
        )
        .unwrap();

        assert_eq!(
            provider.endpoint(),
            "https://gis.example.gov/portal/sharing/rest/generateToken"
        );
        assert_eq!(provider.generate().unwrap(), Some("portal-abc".to_string()));

        let requests = provider.http.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].param("username"), Some("jdoe"));
        assert_eq!(requests[0].param("client"), Some("referer"));
        assert_eq!(requests[0].param("f"), Some("json"));
    }

    #[test]
    fn test_portal_provider_error_response() {
        let mock = MockHttpClient::with_json(&[
            r#"{"error":{"code":400,"message":"Unable to generate token.","details":[]}}"#,
        ]);
        let provider =
            PortalTokenProvider::new(mock, "https://gis.example.gov/portal", "u", "p", "r").unwrap();

        let err = provider.generate().unwrap_err();
        assert!(matches!(err, QueryError::Credential(ref msg) if msg.contains("Unable to generate token")));
    }

    #[test]
    fn test_portal_provider_rejects_bad_url() {
        let result = PortalTokenProvider::new(MockHttpClient::default(), "not a url", "u", "p", "r");
        assert!(matches!(result, Err(QueryError::Credential(_))));
    }
}
