//! Customer, session, and message domain types.
//!
//! These are the value objects the whole system revolves around:
//! a Customer authenticates by phone number, opens a ChatSession, and
//! exchanges ChatMessages with the assistant until the session is closed
//! with a summary.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The role of a persisted conversation turn.
///
/// Only `user` and `assistant` turns are ever stored; system entries exist
/// solely inside LLM requests (see [`crate::provider::PromptRole`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

/// A customer, identified by a unique phone number.
///
/// Created on first contact (as a non-member) and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,

    /// Unique, indexed lookup key.
    pub phone_number: String,

    pub name: Option<String>,

    pub birth_date: Option<NaiveDate>,

    /// Whether the caller is a subscribed member (false for walk-in callers).
    pub is_member: bool,

    /// Name of the currently subscribed plan (members only).
    pub current_plan: Option<String>,

    /// Date the current plan was subscribed (members only).
    pub subscription_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Age in full years on `today`, or `None` without a birth date.
    ///
    /// Decremented by one when `today`'s (month, day) precedes the birth
    /// (month, day) — the anniversary has not been reached yet this year.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let birth = self.birth_date?;
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        Some(age)
    }
}

/// Fields for inserting a customer row directly (seeding, imports).
///
/// First-contact creation goes through `ChatStore::create_customer` instead,
/// which always produces a non-member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub phone_number: String,
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub is_member: bool,
    pub current_plan: Option<String>,
    pub subscription_date: Option<NaiveDate>,
}

/// One bounded support conversation, open until explicitly closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: i64,

    pub customer_id: i64,

    pub started_at: DateTime<Utc>,

    /// Set exactly once, together with `summary`, when the session closes.
    pub ended_at: Option<DateTime<Utc>>,

    pub summary: Option<String>,
}

impl ChatSession {
    /// A session is closed iff its end timestamp is set.
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// A single persisted conversation turn. Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
