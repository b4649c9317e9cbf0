use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;

// Use the re-exported module path for Qdrant internally
pub use qdrant_client;
use self::qdrant_client::qdrant::{
    point_id::PointIdOptions, points_selector::PointsSelectorOneOf, value::Kind as QdrantValueKind,
    with_payload_selector, with_vectors_selector, Condition, Filter, PointId, PointsIdsList,
    ScoredPoint, SearchPoints, SetPayloadPointsBuilder, WithPayloadSelector,
    WithVectorsSelector,
};
use self::qdrant_client::{Payload, Qdrant, QdrantError};

use crate::config::StoreConfig;
use crate::domain::result::{PointKey, RawHit};
use crate::domain::vector_repository::VectorRepository;
use crate::error::SearchError;

/// Qdrant-backed implementation of [`VectorRepository`].
///
/// The connection handle is created once and shared read-only by every
/// search and deprecation call issued through this instance.
pub struct QdrantStore {
    client: Option<Qdrant>,
    collection: String,
    init_error: Option<SearchError>,
}

impl QdrantStore {
    /// Builds the connection handle from the configured endpoint.
    ///
    /// A handle that cannot be built is captured as a configuration error
    /// and leaves the store in a clearly unavailable state: subsequent
    /// operations fail fast with a connection error instead of touching a
    /// half-constructed client.
    pub fn connect(config: &StoreConfig) -> Self {
        let endpoint = config.endpoint();
        match Qdrant::from_url(&endpoint).build() {
            Ok(client) => {
                log::info!(
                    "Vector store client ready for collection '{}' at {}",
                    config.collection,
                    endpoint
                );
                Self {
                    client: Some(client),
                    collection: config.collection.clone(),
                    init_error: None,
                }
            }
            Err(e) => {
                log::error!("Failed to build vector store client for {}: {}", endpoint, e);
                Self {
                    client: None,
                    collection: config.collection.clone(),
                    init_error: Some(SearchError::Configuration(format!(
                        "invalid vector store endpoint {}: {}",
                        endpoint, e
                    ))),
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    /// The construction failure, if any, behind an unavailable store.
    pub fn init_error(&self) -> Option<&SearchError> {
        self.init_error.as_ref()
    }

    fn client(&self) -> Result<&Qdrant, SearchError> {
        self.client.as_ref().ok_or_else(|| {
            SearchError::Connection("vector store client was never initialized".to_string())
        })
    }
}

#[async_trait]
impl VectorRepository for QdrantStore {
    async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
        exclude_deprecated: bool,
    ) -> Result<Vec<RawHit>, SearchError> {
        let client = self.client()?;

        let filter = exclude_deprecated.then(|| Filter {
            must_not: vec![Condition::matches("deprecated", true)],
            ..Default::default()
        });

        let request = SearchPoints {
            collection_name: self.collection.clone(),
            vector,
            limit,
            filter,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            with_vectors: Some(WithVectorsSelector {
                selector_options: Some(with_vectors_selector::SelectorOptions::Enable(false)),
            }),
            ..Default::default()
        };

        log::debug!(
            "Searching collection '{}' with limit {} (exclude_deprecated: {})",
            self.collection,
            limit,
            exclude_deprecated
        );

        let response = client
            .search_points(request)
            .await
            .map_err(|e| classify(e, SearchError::Query))?;

        log::info!(
            "Search in '{}' returned {} hits",
            self.collection,
            response.result.len()
        );
        Ok(response.result.into_iter().filter_map(to_raw_hit).collect())
    }

    async fn mark_deprecated(&self, id: &PointKey) -> Result<(), SearchError> {
        let client = self.client()?;

        let patch = serde_json::json!({
            "deprecated": true,
            "deprecated_at": Utc::now().to_rfc3339(),
        });
        let payload = Payload::try_from(patch)
            .map_err(|e| SearchError::Update(format!("failed to build payload patch: {}", e)))?;

        let selector = PointsSelectorOneOf::Points(PointsIdsList {
            ids: vec![to_point_id(id)],
        });
        let request = SetPayloadPointsBuilder::new(self.collection.clone(), payload)
            .points_selector(selector)
            .wait(true);

        log::info!(
            "Marking point {} as deprecated in collection '{}'",
            id,
            self.collection
        );
        client
            .set_payload(request)
            .await
            .map_err(|e| classify(e, SearchError::Update))?;
        Ok(())
    }
}

/// Splits store failures into "unreachable" and "request rejected". gRPC
/// `Unavailable` means the store never handled the request.
fn classify(error: QdrantError, reject: impl FnOnce(String) -> SearchError) -> SearchError {
    match error {
        QdrantError::ResponseError { status } if status.code() == tonic::Code::Unavailable => {
            SearchError::Connection(status.message().to_string())
        }
        QdrantError::ResponseError { status } => reject(status.message().to_string()),
        other => SearchError::Connection(other.to_string()),
    }
}

fn to_point_id(key: &PointKey) -> PointId {
    let options = match key {
        PointKey::Num(n) => PointIdOptions::Num(*n),
        PointKey::Uuid(s) => PointIdOptions::Uuid(s.clone()),
    };
    PointId {
        point_id_options: Some(options),
    }
}

fn to_point_key(id: PointId) -> Option<PointKey> {
    match id.point_id_options? {
        PointIdOptions::Num(n) => Some(PointKey::Num(n)),
        PointIdOptions::Uuid(s) => Some(PointKey::Uuid(s)),
    }
}

fn to_raw_hit(point: ScoredPoint) -> Option<RawHit> {
    let Some(id) = point.id.and_then(to_point_key) else {
        log::warn!("Search hit without a usable point id, skipping");
        return None;
    };
    Some(RawHit {
        id,
        score: Some(point.score),
        payload: payload_to_json_map(point.payload),
    })
}

fn payload_to_json_map(
    payload: HashMap<String, qdrant_client::qdrant::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    payload
        .into_iter()
        .map(|(key, value)| (key, qdrant_value_to_json(value)))
        .collect()
}

fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    match value.kind {
        None | Some(QdrantValueKind::NullValue(_)) => serde_json::Value::Null,
        Some(QdrantValueKind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(QdrantValueKind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(QdrantValueKind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(QdrantValueKind::StringValue(s)) => serde_json::Value::String(s),
        Some(QdrantValueKind::ListValue(list)) => serde_json::Value::Array(
            list.values.into_iter().map(qdrant_value_to_json).collect(),
        ),
        Some(QdrantValueKind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(key, value)| (key, qdrant_value_to_json(value)))
                .collect(),
        ),
    }
}
