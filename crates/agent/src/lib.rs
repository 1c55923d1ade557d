//! Consultation orchestration — the conversational core of Careline.
//!
//! Every user turn moves through a fixed pipeline:
//!
//! 1. **Receive** the message for an open session
//! 2. **Classify** it against the escalation policy (human hand-off?)
//! 3. **Contextualize** — customer profile + retrieved plan documents
//! 4. **Generate** a reply via the configured LLM provider
//! 5. **Persist** both turns in the relational store
//!
//! An escalated turn short-circuits after step 2 with a fixed notice; it
//! never reaches the LLM. Closing a session produces an LLM summary that
//! is stored atomically with the end timestamp.

pub mod context;
pub mod escalation;
pub mod orchestrator;
pub mod prompts;
pub mod session;
pub mod summary;

pub use context::ContextAssembler;
pub use escalation::{EscalationClassifier, EscalationOutcome};
pub use orchestrator::{AuthOutcome, Consultant, TurnOutcome};
pub use session::{SessionClosure, SessionDetail, SessionManager};
pub use summary::SummaryGenerator;

#[cfg(test)]
pub(crate) mod test_helpers;
