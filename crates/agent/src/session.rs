//! Session lifecycle — closing with a summary, and history lookups.

use std::sync::Arc;

use careline_core::domain::{ChatMessage, ChatSession};
use careline_core::store::ChatStore;
use careline_core::{Error, Result};
use chrono::Utc;
use tracing::info;

use crate::summary::SummaryGenerator;

/// Result of closing a session.
#[derive(Debug, Clone)]
pub struct SessionClosure {
    pub session_id: i64,
    pub summary: String,
    /// Total persisted turns, greeting included.
    pub message_count: usize,
}

/// One session with its full transcript.
#[derive(Debug, Clone)]
pub struct SessionDetail {
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// Closes sessions and serves consultation history.
pub struct SessionManager {
    store: Arc<dyn ChatStore>,
    summarizer: SummaryGenerator,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ChatStore>, summarizer: SummaryGenerator) -> Self {
        Self { store, summarizer }
    }

    /// Close an open session: summarize the transcript, then store the end
    /// timestamp and summary atomically. Closing twice is an error.
    pub async fn close(&self, session_id: i64) -> Result<SessionClosure> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;
        if session.is_closed() {
            return Err(Error::AlreadyClosed(session_id));
        }

        let messages = self.store.list_messages(session_id).await?;
        let summary = self.summarizer.summarize(&messages).await;
        self.store.close_session(session_id, Utc::now(), &summary).await?;
        let message_count = self.store.count_messages(session_id).await?;

        info!(session_id, message_count, "Session closed");
        Ok(SessionClosure {
            session_id,
            summary,
            message_count,
        })
    }

    /// All sessions for a phone number, most recent first. Unknown numbers
    /// simply have no history.
    pub async fn history(&self, phone_number: &str) -> Result<Vec<ChatSession>> {
        match self.store.find_customer_by_phone(phone_number.trim()).await? {
            Some(customer) => Ok(self.store.sessions_for_customer(customer.id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// One session with its full transcript.
    pub async fn detail(&self, session_id: i64) -> Result<SessionDetail> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;
        let messages = self.store.list_messages(session_id).await?;
        Ok(SessionDetail { session, messages })
    }
}
