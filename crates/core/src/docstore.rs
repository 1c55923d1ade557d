//! Document store trait — the boundary to the external vector database.
//!
//! Plan documents are keyed by a normalized plan-name identifier, so
//! re-ingestion of the same plan overwrites instead of duplicating.
//! Careline only consumes similarity search; it never reimplements it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DocStoreError;

/// Structured plan fields as extracted during ingestion.
///
/// `Default` fills the free-tier placeholders the extraction prompt allows
/// the model to omit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFields {
    pub plan_name: String,

    /// Monthly fee, possibly a range (e.g. "30,000원~69,000원").
    #[serde(default)]
    pub monthly_fee: String,

    /// Data allowance (e.g. "무제한", "30GB~110GB").
    #[serde(default)]
    pub data_allowance: String,

    #[serde(default = "default_allowance")]
    pub call_allowance: String,

    #[serde(default = "default_allowance")]
    pub text_allowance: String,

    /// Target age / eligibility (e.g. "전체", "만 34세 이하").
    #[serde(default = "default_target_age")]
    pub target_age: String,

    /// Key benefits, comma separated.
    #[serde(default)]
    pub benefits: String,

    /// Bundled extra services, comma separated.
    #[serde(default)]
    pub additional_services: String,
}

fn default_allowance() -> String {
    "기본 제공".into()
}
fn default_target_age() -> String {
    "전체".into()
}

impl PlanFields {
    /// Stable upsert key: `plan_` + plan name with spaces collapsed to `_`.
    pub fn document_id(&self) -> String {
        format!("plan_{}", self.plan_name.replace(' ', "_"))
    }

    /// Compose the searchable document text from labeled fields.
    pub fn compose_text(&self) -> String {
        [
            format!("요금제명: {}", self.plan_name),
            format!("월정액: {}", self.monthly_fee),
            format!("데이터: {}", self.data_allowance),
            format!("통화: {}", self.call_allowance),
            format!("문자: {}", self.text_allowance),
            format!("대상: {}", self.target_age),
            format!("혜택: {}", self.benefits),
            format!("부가서비스: {}", self.additional_services),
        ]
        .join("\n")
    }

    /// The metadata subset stored next to the document text.
    pub fn metadata(&self) -> PlanMetadata {
        PlanMetadata {
            plan_name: self.plan_name.clone(),
            monthly_fee: self.monthly_fee.clone(),
            data_allowance: self.data_allowance.clone(),
            target_age: self.target_age.clone(),
        }
    }

    /// Build the full document record ready for upsert.
    pub fn into_document(self) -> PlanDocument {
        PlanDocument {
            id: self.document_id(),
            text: self.compose_text(),
            metadata: self.metadata(),
        }
    }
}

/// Structured metadata stored with each plan document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub plan_name: String,
    pub monthly_fee: String,
    pub data_allowance: String,
    pub target_age: String,
}

/// A semantic record in the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    /// Normalized plan-name key; upserts by this id overwrite.
    pub id: String,
    /// Composed descriptive text, rendered verbatim into LLM context.
    pub text: String,
    pub metadata: PlanMetadata,
}

/// A document returned from a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: PlanDocument,
    /// Distance reported by the store; smaller is closer.
    pub distance: f32,
}

/// The document store trait.
///
/// Implementations: Chroma HTTP client (production), in-memory (tests).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The backend name (e.g. "chroma", "in_memory").
    fn name(&self) -> &str;

    /// Insert or overwrite a document by its id.
    async fn upsert(&self, document: PlanDocument) -> std::result::Result<(), DocStoreError>;

    /// Similarity search with the raw query text; returns at most `top_k`
    /// documents ranked by ascending distance.
    async fn query(
        &self,
        text: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<ScoredDocument>, DocStoreError>;

    /// All stored documents, unranked.
    async fn get_all(&self) -> std::result::Result<Vec<PlanDocument>, DocStoreError>;

    /// Drop the whole collection. Missing collections are not an error.
    async fn clear(&self) -> std::result::Result<(), DocStoreError>;

    /// Number of stored documents.
    async fn count(&self) -> std::result::Result<usize, DocStoreError>;
}
