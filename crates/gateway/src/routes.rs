//! Route handlers and wire DTOs.
//!
//! The JSON field names are the public API contract; domain types never
//! cross the HTTP boundary directly.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use careline_agent::{SessionClosure, SessionDetail};
use careline_core::Error;
use careline_core::domain::{ChatMessage, ChatSession, Customer};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::SharedState;

/// Transcription language hint sent to the STT backend.
const STT_LANGUAGE: &str = "ko";

/// Container formats the STT backend accepts.
const ALLOWED_AUDIO_EXTENSIONS: &[&str] = &["mp3", "mp4", "mpeg", "mpga", "m4a", "wav", "webm"];

/// Upstream STT file-size limit.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

// ── Error mapping ─────────────────────────────────────────────────────────

/// Wraps a domain error for conversion into an HTTP response.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            e if e.is_invalid_state() => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            e if e.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        }

        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// ── Wire DTOs ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CustomerDto {
    pub id: i64,
    pub phone_number: String,
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub is_member: bool,
    pub current_plan: Option<String>,
    pub subscription_date: Option<NaiveDate>,
}

impl From<Customer> for CustomerDto {
    fn from(c: Customer) -> Self {
        Self {
            id: c.id,
            phone_number: c.phone_number,
            name: c.name,
            birth_date: c.birth_date,
            is_member: c.is_member,
            current_plan: c.current_plan,
            subscription_date: c.subscription_date,
        }
    }
}

#[derive(Deserialize)]
pub struct AuthRequest {
    pub phone_number: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub is_member: bool,
    pub customer: CustomerDto,
    pub session_id: i64,
    pub greeting_message: String,
}

#[derive(Deserialize)]
pub struct ChatMessageRequest {
    pub session_id: i64,
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatMessageResponse {
    pub session_id: i64,
    pub user_message: String,
    pub assistant_message: String,
    pub requires_human_agent: bool,
}

#[derive(Deserialize)]
pub struct ChatEndRequest {
    pub session_id: i64,
}

#[derive(Serialize)]
pub struct ChatEndResponse {
    pub session_id: i64,
    pub summary: String,
    pub message_count: usize,
}

impl From<SessionClosure> for ChatEndResponse {
    fn from(c: SessionClosure) -> Self {
        Self {
            session_id: c.session_id,
            summary: c.summary,
            message_count: c.message_count,
        }
    }
}

/// Transcription result. Upstream STT failures surface here as
/// `success: false` rather than an error status.
#[derive(Serialize)]
pub struct SttResponse {
    pub success: bool,
    pub transcribed_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct MessageDto {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageDto {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            role: m.role.as_str().to_string(),
            content: m.content,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct SessionHistoryDto {
    pub id: i64,
    pub session_start: DateTime<Utc>,
    pub session_end: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub messages: Vec<MessageDto>,
}

impl SessionHistoryDto {
    /// List form: session metadata only, no transcript.
    fn without_messages(s: ChatSession) -> Self {
        Self {
            id: s.id,
            session_start: s.started_at,
            session_end: s.ended_at,
            summary: s.summary,
            messages: Vec::new(),
        }
    }
}

impl From<SessionDetail> for SessionHistoryDto {
    fn from(d: SessionDetail) -> Self {
        Self {
            id: d.session.id,
            session_start: d.session.started_at,
            session_end: d.session.ended_at,
            summary: d.session.summary,
            messages: d.messages.into_iter().map(MessageDto::from).collect(),
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn verify(
    State(state): State<SharedState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let outcome = state.consultant.authenticate(&request.phone_number).await?;
    Ok(Json(AuthResponse {
        success: true,
        is_member: outcome.customer.is_member,
        session_id: outcome.session.id,
        greeting_message: outcome.greeting,
        customer: outcome.customer.into(),
    }))
}

pub async fn chat_message(
    State(state): State<SharedState>,
    Json(request): Json<ChatMessageRequest>,
) -> Result<Json<ChatMessageResponse>, ApiError> {
    let _turn = state.turn_locks.lock(request.session_id).await;

    let outcome = state
        .consultant
        .process_message(request.session_id, &request.message)
        .await?;

    Ok(Json(ChatMessageResponse {
        session_id: request.session_id,
        user_message: request.message,
        assistant_message: outcome.reply().to_string(),
        requires_human_agent: outcome.requires_human(),
    }))
}

pub async fn chat_end(
    State(state): State<SharedState>,
    Json(request): Json<ChatEndRequest>,
) -> Result<Json<ChatEndResponse>, ApiError> {
    let _turn = state.turn_locks.lock(request.session_id).await;

    let closure = state.sessions.close(request.session_id).await?;

    Ok(Json(closure.into()))
}

pub async fn transcribe(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<SttResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("multipart 요청을 읽을 수 없습니다: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("audio").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| Error::Validation(format!("파일을 읽을 수 없습니다: {e}")))?;
            upload = Some((filename, data.to_vec()));
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| Error::Validation("file 필드가 필요합니다.".into()))?;

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        return Err(Error::Validation(format!(
            "지원하지 않는 파일 형식입니다. 지원 형식: {}",
            ALLOWED_AUDIO_EXTENSIONS.join(", ")
        ))
        .into());
    }
    if data.len() > MAX_AUDIO_BYTES {
        return Err(Error::Validation("파일 크기가 25MB를 초과했습니다.".into()).into());
    }

    match state
        .transcriber
        .transcribe(data, &filename, STT_LANGUAGE)
        .await
    {
        Ok(text) => Ok(Json(SttResponse {
            success: true,
            transcribed_text: text,
            error: None,
        })),
        Err(e) => {
            warn!(error = %e, "Transcription failed");
            Ok(Json(SttResponse {
                success: false,
                transcribed_text: String::new(),
                error: Some(e.to_string()),
            }))
        }
    }
}

pub async fn customer_history(
    State(state): State<SharedState>,
    Path(phone_number): Path<String>,
) -> Result<Json<Vec<SessionHistoryDto>>, ApiError> {
    let sessions = state.sessions.history(&phone_number).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(SessionHistoryDto::without_messages)
            .collect(),
    ))
}

pub async fn session_detail(
    State(state): State<SharedState>,
    Path(session_id): Path<i64>,
) -> Result<Json<SessionHistoryDto>, ApiError> {
    let detail = state.sessions.detail(session_id).await?;
    Ok(Json(detail.into()))
}
