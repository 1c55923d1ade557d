//! Error types for the Careline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Careline operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Not found ---
    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    // --- Invalid state ---
    #[error("Session {0} is closed and accepts no further messages")]
    SessionClosed(i64),

    #[error("Session {0} has already been closed")]
    AlreadyClosed(i64),

    // --- Validation ---
    #[error("Validation failed: {0}")]
    Validation(String),

    // --- Upstream collaborators ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Document store error: {0}")]
    DocumentStore(#[from] DocStoreError),

    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for unknown-session/unknown-customer errors (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::SessionNotFound(_) | Error::CustomerNotFound(_))
    }

    /// True for operations attempted on a closed session (HTTP 409).
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::SessionClosed(_) | Error::AlreadyClosed(_))
    }

    /// True for failures of an external collaborator (HTTP 502).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Provider(_) | Error::Store(_) | Error::DocumentStore(_)
        )
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unparsable provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum DocStoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}
