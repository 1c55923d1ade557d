//! In-memory document store — useful for testing and ephemeral runs.
//!
//! Scoring is a naive token-overlap approximation of similarity search:
//! good enough to exercise the retrieval pipeline, not a vector database.

use async_trait::async_trait;
use careline_core::docstore::{DocumentStore, PlanDocument, ScoredDocument};
use careline_core::error::DocStoreError;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-memory document store backed by a Vec.
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<Vec<PlanDocument>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Fraction of query tokens present in the document text.
    fn overlap(query: &str, text: &str) -> f32 {
        let text_lower = text.to_lowercase();
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if tokens.is_empty() {
            return 0.0;
        }
        let hits = tokens.iter().filter(|t| text_lower.contains(t.as_str())).count();
        hits as f32 / tokens.len() as f32
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert(&self, document: PlanDocument) -> Result<(), DocStoreError> {
        let mut documents = self.documents.write().await;
        // Upsert-by-key: overwrite, never duplicate.
        documents.retain(|d| d.id != document.id);
        documents.push(document);
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ScoredDocument>, DocStoreError> {
        let documents = self.documents.read().await;

        // Like a real vector store, the nearest top_k come back regardless
        // of how weak the match is.
        let mut results: Vec<ScoredDocument> = documents
            .iter()
            .map(|d| ScoredDocument {
                document: d.clone(),
                distance: 1.0 - Self::overlap(text, &d.text),
            })
            .collect();
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn get_all(&self) -> Result<Vec<PlanDocument>, DocStoreError> {
        Ok(self.documents.read().await.clone())
    }

    async fn clear(&self) -> Result<(), DocStoreError> {
        self.documents.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, DocStoreError> {
        Ok(self.documents.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::docstore::PlanFields;

    fn plan(name: &str, data: &str) -> PlanDocument {
        PlanFields {
            plan_name: name.into(),
            monthly_fee: "55,000원".into(),
            data_allowance: data.into(),
            call_allowance: "기본 제공".into(),
            text_allowance: "기본 제공".into(),
            target_age: "전체".into(),
            benefits: String::new(),
            additional_services: String::new(),
        }
        .into_document()
    }

    #[tokio::test]
    async fn upsert_same_key_overwrites() {
        let store = InMemoryDocumentStore::new();
        store.upsert(plan("5G 슬림", "14GB")).await.unwrap();
        store.upsert(plan("5G 슬림", "21GB")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let all = store.get_all().await.unwrap();
        assert!(all[0].text.contains("21GB"));
    }

    #[tokio::test]
    async fn query_ranks_by_overlap_and_truncates() {
        let store = InMemoryDocumentStore::new();
        store.upsert(plan("5G 슬림", "14GB")).await.unwrap();
        store.upsert(plan("5G 시니어", "10GB")).await.unwrap();
        store.upsert(plan("5G Y", "무제한")).await.unwrap();

        let results = store.query("시니어 요금제", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].document.text.contains("시니어"));
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = InMemoryDocumentStore::new();
        assert!(store.query("아무거나", 5).await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let store = InMemoryDocumentStore::new();
        store.upsert(plan("5G 슬림", "14GB")).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
