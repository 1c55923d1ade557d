//! Session summarization.
//!
//! Summaries annotate closed sessions; they must never block a close. A
//! provider failure therefore degrades to an error-annotated summary
//! string instead of propagating.

use std::sync::Arc;

use careline_core::domain::{ChatMessage, Role};
use careline_core::provider::{ChatRequest, PromptMessage, Provider};
use tracing::warn;

const SUMMARY_TEMPERATURE: f32 = 0.5;
const SUMMARY_MAX_TOKENS: u32 = 500;

/// Stored when the session has no messages at all.
pub const EMPTY_SESSION_SUMMARY: &str = "상담 내용이 없습니다.";

/// Stored when the session never got past a single message.
pub const SHORT_SESSION_SUMMARY: &str = "상담이 충분히 진행되지 않았습니다.";

/// Produces the closing summary for a session transcript.
pub struct SummaryGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    prompt: String,
}

impl SummaryGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            prompt: prompt.into(),
        }
    }

    /// Summarize a full session transcript. Infallible: sessions with too
    /// little content get a fixed notice, provider failures an annotated
    /// placeholder.
    pub async fn summarize(&self, messages: &[ChatMessage]) -> String {
        if messages.is_empty() {
            return EMPTY_SESSION_SUMMARY.to_string();
        }
        if messages.len() < 2 {
            return SHORT_SESSION_SUMMARY.to_string();
        }

        let transcript = format_transcript(messages);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                PromptMessage::system(self.prompt.clone()),
                PromptMessage::user(format!("대화 내용:\n{transcript}")),
            ],
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: Some(SUMMARY_MAX_TOKENS),
        };

        match self.provider.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(error = %e, "Summary generation failed");
                format!("요약 생성 중 오류 발생: {e}")
            }
        }
    }
}

fn format_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "고객",
                Role::Assistant => "상담원",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::SUMMARY_PROMPT;
    use crate::test_helpers::{FailingProvider, ScriptedProvider};
    use chrono::Utc;

    fn message(id: i64, role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            id,
            session_id: 1,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    fn transcript() -> Vec<ChatMessage> {
        vec![
            message(1, Role::Assistant, "안녕하세요"),
            message(2, Role::User, "데이터 요금제 추천해 주세요"),
            message(3, Role::Assistant, "5G 슬림을 추천드립니다"),
        ]
    }

    #[tokio::test]
    async fn empty_session_gets_fixed_notice_without_llm_call() {
        let provider = Arc::new(ScriptedProvider::single("unused"));
        let generator = SummaryGenerator::new(provider.clone(), "gpt-4", SUMMARY_PROMPT);
        assert_eq!(generator.summarize(&[]).await, EMPTY_SESSION_SUMMARY);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn single_message_session_gets_short_notice() {
        let provider = Arc::new(ScriptedProvider::single("unused"));
        let generator = SummaryGenerator::new(provider.clone(), "gpt-4", SUMMARY_PROMPT);
        let only = vec![message(1, Role::Assistant, "안녕하세요")];
        assert_eq!(generator.summarize(&only).await, SHORT_SESSION_SUMMARY);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn transcript_labels_speakers() {
        let provider = Arc::new(ScriptedProvider::single("요약입니다."));
        let generator = SummaryGenerator::new(provider.clone(), "gpt-4", SUMMARY_PROMPT);

        assert_eq!(generator.summarize(&transcript()).await, "요약입니다.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let user_entry = &requests[0].messages[1].content;
        assert!(user_entry.starts_with("대화 내용:\n"));
        assert!(user_entry.contains("상담원: 안녕하세요"));
        assert!(user_entry.contains("고객: 데이터 요금제 추천해 주세요"));
        assert!((requests[0].temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(requests[0].max_tokens, Some(500));
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_annotated_summary() {
        let generator =
            SummaryGenerator::new(Arc::new(FailingProvider), "gpt-4", SUMMARY_PROMPT);
        let summary = generator.summarize(&transcript()).await;
        assert!(summary.starts_with("요약 생성 중 오류 발생:"));
    }
}
