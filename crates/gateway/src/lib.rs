//! HTTP API gateway for Careline.
//!
//! Exposes the consultation REST API:
//!
//! - `GET  /health`                        — liveness probe
//! - `POST /api/auth/verify`               — phone authentication, opens a session
//! - `POST /api/chat/message`              — one consultation turn
//! - `POST /api/chat/end`                  — close a session with a summary
//! - `POST /api/stt/transcribe`            — audio upload → text (multipart)
//! - `GET  /api/history/{phone_number}`    — session list for a customer
//! - `GET  /api/history/session/{id}`      — one session with its transcript
//!
//! Built on Axum; CORS origins come from the gateway config.

pub mod routes;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use careline_agent::{Consultant, SessionManager, SummaryGenerator, prompts};
use careline_core::provider::Transcriber;
use careline_providers::{OpenAiChatProvider, WhisperTranscriber};
use careline_store::{ChromaStore, SqliteStore};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

/// Body cap for the whole gateway; sized to admit a maximal audio upload
/// plus multipart framing, so the upload handler can answer oversized
/// files itself.
const MAX_BODY_BYTES: usize = 26 * 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub consultant: Consultant,
    pub sessions: SessionManager,
    pub transcriber: Arc<dyn Transcriber>,
    pub turn_locks: TurnLocks,
}

pub type SharedState = Arc<GatewayState>;

/// Per-session turn serialization.
///
/// Concurrent turns for the same session would interleave their history
/// snapshots and persisted rows; one lock per session id keeps each
/// session's turns strictly ordered without blocking other sessions.
///
/// Map entries are evicted when the last guard for a session drops, so
/// requests carrying arbitrary session ids cannot grow the map. The map
/// mutex is synchronous and never held across an await.
#[derive(Default)]
pub struct TurnLocks {
    locks: StdMutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl TurnLocks {
    /// Take the turn lock for one session, waiting behind any turn already
    /// in flight. The lock is held until the returned guard drops.
    pub async fn lock(&self, session_id: i64) -> TurnGuard<'_> {
        let entry = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(session_id)
            .or_default()
            .clone();
        let guard = entry.lock_owned().await;
        TurnGuard {
            owner: self,
            session_id,
            guard: Some(guard),
        }
    }
}

/// Holds one session's turn lock; dropping it releases the lock and evicts
/// the map entry unless another turn is still waiting on it.
pub struct TurnGuard<'a> {
    owner: &'a TurnLocks,
    session_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        // Release the session mutex first so this guard's own clone of the
        // Arc is gone before the count is inspected.
        self.guard.take();
        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = locks.get(&self.session_id) {
            // A queued waiter holds its own clone, so strong count 1 means
            // the map reference is the last one left.
            if Arc::strong_count(entry) == 1 {
                locks.remove(&self.session_id);
            }
        }
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/auth/verify", post(routes::verify))
        .route("/api/chat/message", post(routes::chat_message))
        .route("/api/chat/end", post(routes::chat_end))
        .route("/api/stt/transcribe", post(routes::transcribe))
        .route("/api/history/{phone_number}", get(routes::customer_history))
        .route("/api/history/session/{session_id}", get(routes::session_detail))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Wires the production backends (SQLite, Chroma, OpenAI-compatible chat
/// and transcription) behind the orchestration layer and serves until the
/// process is stopped.
pub async fn start(config: careline_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = Arc::new(SqliteStore::new(&config.database.url).await?);
    let documents = Arc::new(ChromaStore::from_config(&config.document_store));
    let provider = Arc::new(OpenAiChatProvider::from_config(&config.provider)?);
    let transcriber: Arc<dyn Transcriber> =
        Arc::new(WhisperTranscriber::from_config(&config.provider)?);

    let consultant = Consultant::new(
        store.clone(),
        documents,
        provider.clone(),
        config.escalation.clone(),
        config.provider.chat_model.clone(),
        prompts::system_prompt(&config.prompts),
    );
    let sessions = SessionManager::new(
        store,
        SummaryGenerator::new(
            provider,
            config.provider.chat_model.clone(),
            prompts::summary_prompt(&config.prompts),
        ),
    );

    let state = Arc::new(GatewayState {
        consultant,
        sessions,
        transcriber,
        turn_locks: TurnLocks::default(),
    });
    let app = build_router(state, &config.gateway.allowed_origins);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn lock_entries_are_evicted_after_each_turn() {
        let locks = TurnLocks::default();

        for session_id in 0..1000 {
            let guard = locks.lock(session_id).await;
            drop(guard);
        }

        // Requests with never-seen session ids leave nothing behind.
        assert!(locks.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn entry_outlives_a_turn_with_a_waiter_queued() {
        let locks = Arc::new(TurnLocks::default());
        let first = locks.lock(7).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _turn = locks.lock(7).await;
            })
        };
        tokio::task::yield_now().await;

        drop(first);
        waiter.await.unwrap();
        assert!(locks.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_session_turns_never_overlap() {
        let locks = Arc::new(TurnLocks::default());
        let in_turn = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_turn = in_turn.clone();
            handles.push(tokio::spawn(async move {
                let _turn = locks.lock(1).await;
                assert!(!in_turn.swap(true, Ordering::SeqCst));
                tokio::task::yield_now().await;
                in_turn.store(false, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert!(locks.locks.lock().unwrap().is_empty());
    }
}
