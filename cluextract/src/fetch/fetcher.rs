//! Fetching the features of one accepted request.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::output::{FieldType, OutputFeature, OutputSchema};
use crate::partition::{AcceptedRequest, RequestKey};
use crate::service::{FeatureService, QueryResult, RawFeature};

use super::collection::OutputCollection;
use super::dates::DateFormat;

/// Default attribute used to deduplicate features.
pub const DEFAULT_IDENTIFIER_FIELD: &str = "clu_identifier";

/// Outcome of fetching one request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub key: RequestKey,
    /// Identifiers of features newly added to the collection.
    pub added: Vec<String>,
    /// Features skipped because their identifier was already collected.
    pub duplicates: usize,
    /// Features skipped because they had no geometry.
    pub without_geometry: usize,
    /// The service reported more matches than it returned.
    pub truncated: bool,
}

/// Queries a request's features and adds them to the output collection.
pub struct FeatureFetcher<'a> {
    service: &'a dyn FeatureService,
    schema: &'a OutputSchema,
    identifier_field: String,
    date_format: DateFormat,
}

impl<'a> FeatureFetcher<'a> {
    /// Creates a fetcher deduplicating on `clu_identifier`.
    pub fn new(service: &'a dyn FeatureService, schema: &'a OutputSchema) -> Self {
        Self {
            service,
            schema,
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
            date_format: DateFormat::default(),
        }
    }

    /// Sets the attribute used to deduplicate features.
    pub fn with_identifier_field(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = field.into();
        self
    }

    /// Sets the output date format.
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.date_format = format;
        self
    }

    /// Fetches `request` and adds new features to `collection`.
    ///
    /// Features already present (by identifier) are counted as duplicates.
    /// Nothing is added if the query fails.
    pub fn fetch(
        &self,
        request: &AcceptedRequest,
        collection: &OutputCollection,
    ) -> QueryResult<FetchResult> {
        let batch = self.service.features(&request.geometry)?;

        if batch.exceeded_transfer_limit {
            warn!(
                request = %request.key,
                returned = batch.features.len(),
                "Service returned a partial result for request"
            );
        }

        let mut result = FetchResult {
            key: request.key,
            added: Vec::new(),
            duplicates: 0,
            without_geometry: 0,
            truncated: batch.exceeded_transfer_limit,
        };

        for raw in batch.features {
            let Some(feature) = self.convert(raw) else {
                result.without_geometry += 1;
                continue;
            };

            let id = feature.id.clone();
            if collection.insert(feature) {
                result.added.push(id);
            } else {
                result.duplicates += 1;
            }
        }

        debug!(
            request = %request.key,
            added = result.added.len(),
            duplicates = result.duplicates,
            "Fetched request"
        );
        Ok(result)
    }

    fn convert(&self, raw: RawFeature) -> Option<OutputFeature> {
        let polygon = raw.geometry?;
        let id = match raw.attributes.get(&self.identifier_field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => serde_json::to_string(&polygon.rings).ok()?,
        };

        let geometry = polygon.to_multi_polygon();
        if geometry.0.is_empty() {
            return None;
        }

        let mut attributes = Map::new();
        for field in self.schema.fields() {
            let value = raw.attributes.get(&field.name).unwrap_or(&Value::Null);
            let value = match field.field_type {
                FieldType::Date => self.date_format.normalize(value),
                _ => value.clone(),
            };
            attributes.insert(field.name.clone(), value);
        }

        Some(OutputFeature {
            id,
            attributes,
            geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputField;
    use crate::service::{FeatureBatch, LayerMetadata, QueryError};
    use geo::{polygon, MultiPolygon};
    use serde_json::json;

    /// Service answering every feature query with the same body.
    struct FixedService {
        body: Value,
    }

    impl FeatureService for FixedService {
        fn metadata(&self) -> QueryResult<LayerMetadata> {
            Err(QueryError::EmptyResponse)
        }

        fn count(&self, _region: &MultiPolygon<f64>) -> QueryResult<u64> {
            Ok(0)
        }

        fn features(&self, _region: &MultiPolygon<f64>) -> QueryResult<FeatureBatch> {
            FeatureBatch::from_value(self.body.clone())
        }
    }

    fn schema() -> OutputSchema {
        OutputSchema::new(vec![
            OutputField {
                name: "clu_identifier".to_string(),
                field_type: FieldType::Text,
                alias: "clu_identifier".to_string(),
                length: Some(36),
            },
            OutputField {
                name: "creation_date".to_string(),
                field_type: FieldType::Date,
                alias: "creation_date".to_string(),
                length: None,
            },
        ])
    }

    fn request(n: u64) -> AcceptedRequest {
        AcceptedRequest {
            key: RequestKey(n),
            geometry: MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 1.0),
            ]]),
            count: 2,
        }
    }

    fn ring() -> Value {
        json!({"rings": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]]})
    }

    #[test]
    fn test_fetch_adds_and_formats_features() {
        let service = FixedService {
            body: json!({"features": [
                {"attributes": {"clu_identifier": "A", "creation_date": 1609459200000i64, "extra": 1}, "geometry": ring()},
                {"attributes": {"clu_identifier": "B", "creation_date": null}, "geometry": ring()}
            ]}),
        };
        let schema = schema();
        let fetcher = FeatureFetcher::new(&service, &schema);
        let collection = OutputCollection::new();

        let result = fetcher.fetch(&request(1), &collection).unwrap();
        assert_eq!(result.added, vec!["A", "B"]);
        assert_eq!(result.duplicates, 0);
        assert!(!result.truncated);

        let features = collection.into_features();
        assert_eq!(features[0].attributes["creation_date"], json!("01/01/2021"));
        assert_eq!(features[1].attributes["creation_date"], Value::Null);
        assert!(!features[0].attributes.contains_key("extra"));
    }

    #[test]
    fn test_overlapping_requests_deduplicate() {
        let service = FixedService {
            body: json!({"features": [
                {"attributes": {"clu_identifier": "A"}, "geometry": ring()}
            ]}),
        };
        let schema = schema();
        let fetcher = FeatureFetcher::new(&service, &schema);
        let collection = OutputCollection::new();

        fetcher.fetch(&request(1), &collection).unwrap();
        let second = fetcher.fetch(&request(2), &collection).unwrap();

        assert!(second.added.is_empty());
        assert_eq!(second.duplicates, 1);
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_missing_identifier_keyed_by_geometry() {
        let service = FixedService {
            body: json!({"features": [
                {"attributes": {}, "geometry": ring()},
                {"attributes": {"clu_identifier": null}, "geometry": ring()}
            ]}),
        };
        let schema = schema();
        let fetcher = FeatureFetcher::new(&service, &schema);
        let collection = OutputCollection::new();

        let result = fetcher.fetch(&request(1), &collection).unwrap();
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.duplicates, 1);
    }

    #[test]
    fn test_feature_without_geometry_skipped() {
        let service = FixedService {
            body: json!({"exceededTransferLimit": true, "features": [
                {"attributes": {"clu_identifier": "A"}}
            ]}),
        };
        let schema = schema();
        let fetcher = FeatureFetcher::new(&service, &schema);
        let collection = OutputCollection::new();

        let result = fetcher.fetch(&request(1), &collection).unwrap();
        assert_eq!(result.without_geometry, 1);
        assert!(result.truncated);
        assert!(collection.is_empty());
    }

    #[test]
    fn test_custom_identifier_field() {
        let service = FixedService {
            body: json!({"features": [
                {"attributes": {"clu_identifier": "A", "land_unit_id": 7}, "geometry": ring()},
                {"attributes": {"clu_identifier": "B", "land_unit_id": 7}, "geometry": ring()}
            ]}),
        };
        let schema = schema();
        let fetcher = FeatureFetcher::new(&service, &schema).with_identifier_field("land_unit_id");
        let collection = OutputCollection::new();

        let result = fetcher.fetch(&request(1), &collection).unwrap();
        assert_eq!(result.added, vec!["7"]);
        assert_eq!(result.duplicates, 1);
    }
}
