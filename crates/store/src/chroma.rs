//! Chroma document store client.
//!
//! Speaks the Chroma REST API (`/api/v1`): collections are resolved with
//! get-or-create and the resulting collection id is cached until the
//! collection is dropped. Embedding happens server-side; this client only
//! sends raw query text.

use async_trait::async_trait;
use careline_core::docstore::{DocumentStore, PlanDocument, PlanMetadata, ScoredDocument};
use careline_core::error::DocStoreError;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// HTTP client for a Chroma-compatible vector database.
pub struct ChromaStore {
    base_url: String,
    collection: String,
    client: reqwest::Client,
    /// Cached collection UUID; invalidated by `clear()`.
    collection_id: RwLock<Option<String>>,
}

impl ChromaStore {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client,
            collection_id: RwLock::new(None),
        }
    }

    pub fn from_config(config: &careline_config::DocStoreConfig) -> Self {
        Self::new(config.url.clone(), config.collection.clone())
    }

    /// Resolve (and cache) the collection id, creating the collection when
    /// missing.
    async fn collection_id(&self) -> Result<String, DocStoreError> {
        if let Some(id) = self.collection_id.read().await.clone() {
            return Ok(id);
        }

        let url = format!("{}/api/v1/collections", self.base_url);
        let body = serde_json::json!({
            "name": self.collection,
            "get_or_create": true,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocStoreError::Storage(format!("collection request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DocStoreError::Storage(format!(
                "collection request failed (status {status}): {body}"
            )));
        }

        let collection: CollectionResponse = response
            .json()
            .await
            .map_err(|e| DocStoreError::Storage(format!("collection payload: {e}")))?;

        debug!(collection = %self.collection, id = %collection.id, "Resolved collection");
        *self.collection_id.write().await = Some(collection.id.clone());
        Ok(collection.id)
    }

    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, DocStoreError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocStoreError::Storage(format!("request to {path}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DocStoreError::QueryFailed(format!(
                "{path} failed (status {status}): {body}"
            )));
        }
        Ok(response)
    }

    fn parse_metadata(value: serde_json::Value) -> Result<PlanMetadata, DocStoreError> {
        serde_json::from_value(value)
            .map_err(|e| DocStoreError::QueryFailed(format!("metadata payload: {e}")))
    }
}

#[async_trait]
impl DocumentStore for ChromaStore {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn upsert(&self, document: PlanDocument) -> Result<(), DocStoreError> {
        let id = self.collection_id().await?;
        let metadata = serde_json::to_value(&document.metadata)
            .map_err(|e| DocStoreError::Storage(format!("metadata encode: {e}")))?;

        self.post_json(
            &format!("/api/v1/collections/{id}/upsert"),
            serde_json::json!({
                "ids": [document.id],
                "documents": [document.text],
                "metadatas": [metadata],
            }),
        )
        .await?;
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredDocument>, DocStoreError> {
        let id = self.collection_id().await?;
        let response = self
            .post_json(
                &format!("/api/v1/collections/{id}/query"),
                serde_json::json!({
                    "query_texts": [text],
                    "n_results": top_k,
                    "include": ["documents", "metadatas", "distances"],
                }),
            )
            .await?;

        let payload: QueryResponse = response
            .json()
            .await
            .map_err(|e| DocStoreError::QueryFailed(format!("query payload: {e}")))?;

        // One nested list per query text; we always send exactly one.
        let ids = payload.ids.into_iter().next().unwrap_or_default();
        let documents = payload.documents.into_iter().next().unwrap_or_default();
        let metadatas = payload.metadatas.into_iter().next().unwrap_or_default();
        let distances = payload.distances.into_iter().next().unwrap_or_default();

        let mut results = Vec::with_capacity(ids.len());
        for (((id, text), metadata), distance) in ids
            .into_iter()
            .zip(documents)
            .zip(metadatas)
            .zip(distances)
        {
            results.push(ScoredDocument {
                document: PlanDocument {
                    id,
                    text,
                    metadata: Self::parse_metadata(metadata)?,
                },
                distance,
            });
        }
        Ok(results)
    }

    async fn get_all(&self) -> Result<Vec<PlanDocument>, DocStoreError> {
        let id = self.collection_id().await?;
        let response = self
            .post_json(
                &format!("/api/v1/collections/{id}/get"),
                serde_json::json!({ "include": ["documents", "metadatas"] }),
            )
            .await?;

        let payload: GetResponse = response
            .json()
            .await
            .map_err(|e| DocStoreError::QueryFailed(format!("get payload: {e}")))?;

        payload
            .ids
            .into_iter()
            .zip(payload.documents)
            .zip(payload.metadatas)
            .map(|((id, text), metadata)| {
                Ok(PlanDocument {
                    id,
                    text,
                    metadata: Self::parse_metadata(metadata)?,
                })
            })
            .collect()
    }

    async fn clear(&self) -> Result<(), DocStoreError> {
        let url = format!("{}/api/v1/collections/{}", self.base_url, self.collection);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| DocStoreError::Storage(format!("delete collection: {e}")))?;

        // 404 means the collection never existed; that is fine.
        if !response.status().is_success() && response.status().as_u16() != 404 {
            let status = response.status().as_u16();
            return Err(DocStoreError::Storage(format!(
                "delete collection failed (status {status})"
            )));
        }

        *self.collection_id.write().await = None;
        info!(collection = %self.collection, "Collection dropped");
        Ok(())
    }

    async fn count(&self) -> Result<usize, DocStoreError> {
        let id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{id}/count", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DocStoreError::QueryFailed(format!("count request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(DocStoreError::QueryFailed(format!(
                "count failed (status {status})"
            )));
        }

        response
            .json::<usize>()
            .await
            .map_err(|e| DocStoreError::QueryFailed(format!("count payload: {e}")))
    }
}

// ── API DTOs ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Vec<Vec<String>>,
    #[serde(default)]
    metadatas: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    ids: Vec<String>,
    #[serde(default)]
    documents: Vec<String>,
    #[serde(default)]
    metadatas: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_payload_parses_nested_lists() {
        let payload = serde_json::json!({
            "ids": [["plan_5G_슬림"]],
            "documents": [["요금제명: 5G 슬림"]],
            "metadatas": [[{
                "plan_name": "5G 슬림",
                "monthly_fee": "55,000원",
                "data_allowance": "14GB",
                "target_age": "전체"
            }]],
            "distances": [[0.12]]
        });
        let parsed: QueryResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.ids[0][0], "plan_5G_슬림");
        assert!((parsed.distances[0][0] - 0.12).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_query_payload_yields_no_results() {
        let payload = serde_json::json!({ "ids": [[]], "documents": [[]], "metadatas": [[]], "distances": [[]] });
        let parsed: QueryResponse = serde_json::from_value(payload).unwrap();
        assert!(parsed.ids[0].is_empty());
    }
}
