//! ArcGIS feature service access.
//!
//! This module provides the HTTP abstraction, credentials, the remote query
//! primitive with its retry ladder, and the [`FeatureService`] facade used
//! by the partitioner and fetcher.
//!
//! ```ignore
//! use cluextract::service::{Credentials, FeatureLayer, FeatureService, QueryClient, ReqwestClient};
//!
//! let client = QueryClient::new(ReqwestClient::new()?, Credentials::anonymous());
//! let layer = FeatureLayer::new(client, layer_url)?;
//! let count = layer.count(aoi.geometry())?;
//! ```

mod auth;
mod error;
mod http;
mod layer;
mod metadata;
mod policy;
mod query;

pub use auth::{
    Credentials, PortalTokenProvider, StaticToken, TokenProvider, DEFAULT_TOKEN_EXPIRATION_MINUTES,
};
pub use error::{QueryError, QueryResult, INVALID_TOKEN_CODE, TOKEN_REQUIRED_CODE};
pub use http::{HttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use layer::{FeatureLayer, FeatureService};
pub use metadata::{parse_count, FeatureBatch, FieldInfo, LayerMetadata, RawFeature};
pub use policy::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS};
pub use query::{QueryClient, QueryParams};

#[cfg(test)]
pub use http::tests::MockHttpClient;
