//! Feature layer facade.
//!
//! # Query contract
//!
//! Metadata is read from the layer URL itself; counts and features come from
//! `{layer}/query` with the region passed as an Esri JSON polygon:
//!
//! ```text
//! geometry=<esri json>  geometryType=esriGeometryPolygon
//! spatialRel=esriSpatialRelIntersects  inSR=<wkid>  outSR=<wkid>
//! ```

use geo::MultiPolygon;
use tracing::debug;
use url::Url;

use crate::geometry::{EsriPolygon, SpatialReference};

use super::error::{QueryError, QueryResult};
use super::http::HttpClient;
use super::metadata::{parse_count, FeatureBatch, LayerMetadata};
use super::query::{QueryClient, QueryParams};

/// Remote operations the extract pipeline needs from a feature layer.
pub trait FeatureService: Send + Sync {
    /// Reads the layer description.
    fn metadata(&self) -> QueryResult<LayerMetadata>;

    /// Number of features intersecting `region`.
    fn count(&self, region: &MultiPolygon<f64>) -> QueryResult<u64>;

    /// Features intersecting `region`, with geometry and all attributes.
    fn features(&self, region: &MultiPolygon<f64>) -> QueryResult<FeatureBatch>;
}

/// A single layer of an ArcGIS feature service.
///
/// # Example
///
/// ```ignore
/// use cluextract::service::{Credentials, FeatureLayer, QueryClient, ReqwestClient};
///
/// let client = QueryClient::new(ReqwestClient::new()?, Credentials::anonymous());
/// let layer = FeatureLayer::new(client, "https://example.com/arcgis/rest/services/CLU/FeatureServer/0")?;
/// let meta = layer.metadata()?;
/// ```
pub struct FeatureLayer<C: HttpClient> {
    client: QueryClient<C>,
    layer_url: String,
    query_url: String,
    spatial_reference: SpatialReference,
}

impl<C: HttpClient> FeatureLayer<C> {
    /// Creates a facade for the layer at `layer_url`.
    pub fn new(client: QueryClient<C>, layer_url: &str) -> QueryResult<Self> {
        let parsed = Url::parse(layer_url).map_err(|e| {
            QueryError::InvalidResponse(format!("invalid layer URL {}: {}", layer_url, e))
        })?;
        let layer_url = parsed.as_str().trim_end_matches('/').to_string();
        let query_url = format!("{}/query", layer_url);

        Ok(Self {
            client,
            layer_url,
            query_url,
            spatial_reference: SpatialReference::default(),
        })
    }

    /// Sets the spatial reference regions are expressed in and results are
    /// returned in.
    pub fn with_spatial_reference(mut self, spatial_reference: SpatialReference) -> Self {
        self.spatial_reference = spatial_reference;
        self
    }

    /// The layer URL.
    pub fn url(&self) -> &str {
        &self.layer_url
    }

    fn region_params(&self, region: &MultiPolygon<f64>) -> QueryResult<QueryParams> {
        let polygon = EsriPolygon::from_multi_polygon(region, Some(self.spatial_reference));
        let geometry = serde_json::to_string(&polygon)
            .map_err(|e| QueryError::InvalidResponse(format!("geometry encoding: {}", e)))?;

        let mut params = QueryParams::json()
            .with("geometry", geometry)
            .with("geometryType", "esriGeometryPolygon")
            .with("spatialRel", "esriSpatialRelIntersects");

        if let Some(wkid) = self.spatial_reference.effective_wkid() {
            params.set("inSR", wkid.to_string());
            params.set("outSR", wkid.to_string());
        }

        Ok(params)
    }
}

impl<C: HttpClient> FeatureService for FeatureLayer<C> {
    fn metadata(&self) -> QueryResult<LayerMetadata> {
        let value = self.client.query(&self.layer_url, &QueryParams::json())?;
        LayerMetadata::from_value(value)
    }

    fn count(&self, region: &MultiPolygon<f64>) -> QueryResult<u64> {
        let params = self.region_params(region)?.with("returnCountOnly", "true");
        let value = self.client.query(&self.query_url, &params)?;
        let count = parse_count(&value)?;
        debug!(count, "Region count");
        Ok(count)
    }

    fn features(&self, region: &MultiPolygon<f64>) -> QueryResult<FeatureBatch> {
        let params = self
            .region_params(region)?
            .with("returnGeometry", "true")
            .with("outFields", "*");
        let value = self.client.query(&self.query_url, &params)?;
        FeatureBatch::from_value(value)
    }
}
