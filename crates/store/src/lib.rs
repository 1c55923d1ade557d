//! Storage backends for Careline.
//!
//! - [`sqlite::SqliteStore`] — the relational store for customers,
//!   sessions, and messages (production and tests via `:memory:`)
//! - [`chroma::ChromaStore`] — document store over a Chroma-compatible
//!   vector database HTTP API
//! - [`in_memory::InMemoryDocumentStore`] — in-process document store for
//!   tests and ephemeral runs

pub mod chroma;
pub mod in_memory;
pub mod sqlite;

pub use chroma::ChromaStore;
pub use in_memory::InMemoryDocumentStore;
pub use sqlite::SqliteStore;
