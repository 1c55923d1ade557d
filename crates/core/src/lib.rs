//! # Careline Core
//!
//! Domain types, traits, and error definitions for the Careline
//! customer-support chat backend. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: the relational
//! store, the vector document store, the LLM provider, and the speech-to-text
//! service. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod docstore;
pub mod domain;
pub mod error;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use docstore::{DocumentStore, PlanDocument, PlanFields, PlanMetadata, ScoredDocument};
pub use domain::{ChatMessage, ChatSession, Customer, NewCustomer, Role};
pub use error::{Error, Result};
pub use provider::{ChatRequest, ChatResponse, PromptMessage, PromptRole, Provider, Transcriber, Usage};
pub use store::ChatStore;
