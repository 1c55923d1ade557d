//! Relational store trait — customers, sessions, and messages.
//!
//! The exact query set the orchestration layer needs, nothing more. All
//! listing operations return chronological order (ascending `created_at`,
//! id tiebreak) unless stated otherwise.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ChatMessage, ChatSession, Customer, NewCustomer, Role};
use crate::error::StoreError;

/// CRUD boundary over the relational database.
///
/// Implementations: SQLite (production + tests via `:memory:`).
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The backend name (e.g. "sqlite").
    fn name(&self) -> &str;

    // --- Customers ---

    async fn find_customer_by_phone(
        &self,
        phone_number: &str,
    ) -> std::result::Result<Option<Customer>, StoreError>;

    async fn find_customer(&self, customer_id: i64)
        -> std::result::Result<Option<Customer>, StoreError>;

    /// First-contact creation: always a non-member with no plan data.
    async fn create_customer(
        &self,
        phone_number: &str,
        name: Option<&str>,
    ) -> std::result::Result<Customer, StoreError>;

    /// Direct row insertion for seeding and imports.
    async fn insert_customer(
        &self,
        customer: NewCustomer,
    ) -> std::result::Result<Customer, StoreError>;

    // --- Sessions ---

    /// Creates a fresh open session. Not idempotent: every call is a new row.
    async fn create_session(&self, customer_id: i64)
        -> std::result::Result<ChatSession, StoreError>;

    async fn find_session(&self, session_id: i64)
        -> std::result::Result<Option<ChatSession>, StoreError>;

    /// All sessions of a customer, most recently started first.
    async fn sessions_for_customer(
        &self,
        customer_id: i64,
    ) -> std::result::Result<Vec<ChatSession>, StoreError>;

    /// Atomically sets end timestamp and summary together.
    async fn close_session(
        &self,
        session_id: i64,
        ended_at: DateTime<Utc>,
        summary: &str,
    ) -> std::result::Result<(), StoreError>;

    // --- Messages ---

    /// Appends one turn; rows are never mutated or deleted afterwards.
    async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
    ) -> std::result::Result<ChatMessage, StoreError>;

    /// Full ordered message list of a session.
    async fn list_messages(
        &self,
        session_id: i64,
    ) -> std::result::Result<Vec<ChatMessage>, StoreError>;

    /// The last `limit` messages of a session, in chronological order.
    async fn recent_messages(
        &self,
        session_id: i64,
        limit: usize,
    ) -> std::result::Result<Vec<ChatMessage>, StoreError>;

    async fn count_messages(&self, session_id: i64) -> std::result::Result<usize, StoreError>;
}
