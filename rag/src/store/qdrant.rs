use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::KnowledgeStore;
use crate::document::KnowledgeUnit;
use crate::embed::Embedder;
use crate::error::RagError;
use crate::filter::TopicFilter;
use crate::http::{get_json, post_json, put_json, HttpError};

#[derive(Serialize)]
struct CreateCollection<'a> {
    vectors: VectorParams<'a>,
}

#[derive(Serialize)]
struct VectorParams<'a> {
    size: usize,
    distance: &'a str,
}

#[derive(Serialize)]
struct Point {
    id: String,
    vector: Vec<f32>,
    payload: Map<String, Value>,
}

#[derive(Serialize)]
struct UpsertPoints<'a> {
    points: &'a [Point],
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a [f32],
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: Option<QueryResult>,
}

#[derive(Deserialize)]
struct QueryResult {
    points: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    payload: Option<Map<String, Value>>,
}

/// Qdrant-backed store. The collection is created on first insert.
pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
    distance: String,
    embedder: Arc<dyn Embedder>,
    ready: OnceCell<()>,
}

impl QdrantStore {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        collection: impl Into<String>,
        distance: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            collection: collection.into(),
            distance: distance.into(),
            embedder,
            ready: OnceCell::new(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn ensure_collection(&self, vector_size: usize) -> Result<(), HttpError> {
        self.ready
            .get_or_try_init(|| async {
                let url = self.collection_url();
                match get_json::<Value>(&self.client, &url).await {
                    Ok(_) => return Ok(()),
                    Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {}
                    Err(err) => return Err(err),
                }
                let body = CreateCollection {
                    vectors: VectorParams {
                        size: vector_size,
                        distance: &self.distance,
                    },
                };
                put_json::<Value, _>(&self.client, &url, &body).await?;
                for field in ["section_key", "subsection_key"] {
                    let index = json!({"field_name": field, "field_schema": "keyword"});
                    put_json::<Value, _>(&self.client, &format!("{url}/index"), &index).await?;
                }
                info!(collection = %self.collection, vector_size, "created qdrant collection");
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

/// Translates the topic gate into a Qdrant payload filter over the case-folded keys.
fn payload_filter(filter: &TopicFilter) -> Option<Value> {
    let must: Vec<Value> = [
        ("section_key", filter.section_key()),
        ("subsection_key", filter.subsection_key()),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| json!({"key": key, "match": {"value": v}})))
    .collect();
    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

#[async_trait]
impl KnowledgeStore for QdrantStore {
    async fn insert(&self, units: &[KnowledgeUnit]) -> Result<(), RagError> {
        if units.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = units.iter().map(|u| u.content.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| RagError::StoreWrite(e.to_string()))?;
        let vector_size = match vectors.first() {
            Some(v) if vectors.len() == units.len() => v.len(),
            _ => {
                return Err(RagError::StoreWrite(format!(
                    "expected {} embeddings, got {}",
                    units.len(),
                    vectors.len()
                )))
            }
        };
        self.ensure_collection(vector_size)
            .await
            .map_err(|e| RagError::StoreWrite(e.to_string()))?;

        let points: Vec<Point> = units
            .iter()
            .zip(vectors)
            .map(|(unit, vector)| Point {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: unit.to_payload(),
            })
            .collect();
        // One upsert per batch; wait=true so the batch is visible before we return.
        let url = format!("{}/points?wait=true", self.collection_url());
        put_json::<Value, _>(&self.client, &url, &UpsertPoints { points: &points })
            .await
            .map_err(|e| RagError::StoreWrite(e.to_string()))?;
        debug!(collection = %self.collection, count = points.len(), "upserted points");
        Ok(())
    }

    async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        filter: Option<&TopicFilter>,
    ) -> Result<Vec<KnowledgeUnit>, RagError> {
        if top_k == 0 {
            return Ok(vec![]);
        }
        let vector = self
            .embedder
            .embed(&[query_text.to_string()])
            .await
            .map_err(|e| RagError::StoreRead(e.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if vector.is_empty() {
            return Err(RagError::StoreRead("embedding returned no vector".to_string()));
        }

        let url = format!("{}/points/query", self.collection_url());
        let req = QueryRequest {
            query: &vector,
            limit: top_k,
            with_payload: true,
            filter: filter.and_then(payload_filter),
        };
        let res = match post_json::<QueryResponse, _>(&self.client, &url, &req).await {
            Ok(res) => res,
            Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
                debug!(collection = %self.collection, "collection not created yet");
                return Ok(vec![]);
            }
            Err(err) => return Err(RagError::StoreRead(err.to_string())),
        };

        let units = res
            .result
            .map(|r| r.points)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|hit| hit.payload.and_then(KnowledgeUnit::from_payload))
            .filter(|unit| {
                let passes = filter.map_or(true, |f| f.matches(unit));
                if !passes {
                    warn!(section = %unit.section, "qdrant returned a unit outside the topic filter");
                }
                passes
            })
            .take(top_k)
            .collect();
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }
    }

    fn store(server: &MockServer) -> QdrantStore {
        let client = crate::http::build_client(Duration::from_secs(5)).expect("client");
        QdrantStore::new(client, server.uri(), "tax", "Cosine", Arc::new(FixedEmbedder))
    }

    fn ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"result": true, "status": "ok"}))
    }

    #[test]
    fn payload_filter_only_constrains_present_dimensions() {
        assert_eq!(payload_filter(&TopicFilter::default()), None);
        let filter = TopicFilter::new(Some("Income"), None);
        assert_eq!(
            payload_filter(&filter),
            Some(json!({"must": [{"key": "section_key", "match": {"value": "income"}}]}))
        );
    }

    #[tokio::test]
    async fn insert_creates_collection_then_upserts_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/tax"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/tax"))
            .and(body_partial_json(json!({"vectors": {"size": 3, "distance": "Cosine"}})))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/tax/index"))
            .respond_with(ok())
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/tax/points"))
            .and(query_param("wait", "true"))
            .respond_with(ok())
            .expect(2)
            .mount(&server)
            .await;

        let store = store(&server);
        let batch = [
            KnowledgeUnit::general_info("Salary income includes...", Some("Income"), Some("Salary")),
            KnowledgeUnit::qa_pair("How are bonuses taxed?", "As salary.", Some("Income"), Some("Salary")),
        ];
        store.insert(&batch).await.expect("first insert");
        // The collection check runs once per process.
        store.insert(&batch[..1]).await.expect("second insert");
    }

    #[tokio::test]
    async fn upsert_failure_is_a_store_write_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/tax"))
            .respond_with(ok())
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/tax/points"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let err = store(&server)
            .insert(&[KnowledgeUnit::general_info("x", Some("Income"), None)])
            .await
            .expect_err("upsert should fail");
        assert!(matches!(err, RagError::StoreWrite(ref msg) if msg.contains("disk full")));
    }

    #[tokio::test]
    async fn search_sends_filter_and_decodes_payloads() {
        let server = MockServer::start().await;
        let body = json!({
            "result": {"points": [
                {"id": "a", "score": 0.9, "payload": {
                    "content": "Question: Q?\n\nAnswer: A.", "type": "qa_pair",
                    "section": "Income", "subsection": "Salary",
                    "section_key": "income", "subsection_key": "salary", "priority": "medium"
                }},
                {"id": "b", "score": 0.8, "payload": {
                    "content": "Salary income includes...", "type": "general_info",
                    "section": "Income", "subsection": "Salary"
                }}
            ]},
            "status": "ok"
        });
        Mock::given(method("POST"))
            .and(path("/collections/tax/points/query"))
            .and(body_partial_json(json!({
                "limit": 8,
                "with_payload": true,
                "filter": {"must": [{"key": "section_key", "match": {"value": "income"}}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let filter = TopicFilter::new(Some("INCOME"), None);
        let units = store(&server)
            .search("bonus", 8, Some(&filter))
            .await
            .expect("search");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].doc_type, DocumentType::QaPair);
        assert_eq!(units[0].extra.get("priority"), Some(&json!("medium")));
        assert_eq!(units[1].doc_type, DocumentType::GeneralInfo);
    }

    #[tokio::test]
    async fn missing_collection_searches_empty_but_errors_propagate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/tax/points/query"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let units = store(&server).search("q", 8, None).await.expect("empty search");
        assert!(units.is_empty());

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/tax/points/query"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let err = store(&server).search("q", 8, None).await.expect_err("503");
        assert!(matches!(err, RagError::StoreRead(_)));
    }
}
