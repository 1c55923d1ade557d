//! Whisper transcription client.
//!
//! Uploads audio as multipart form data to the OpenAI `/audio/transcriptions`
//! route with `response_format=text`, so the body comes back as plain text.
//! Format and size validation happen in the caller; this client only moves
//! bytes.

use async_trait::async_trait;
use careline_core::error::ProviderError;
use careline_core::provider::Transcriber;
use tracing::{debug, warn};

/// Whisper-backed speech-to-text client.
pub struct WhisperTranscriber {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    /// Build from configuration; errors when no API key is available.
    pub fn from_config(config: &careline_config::LlmConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("no provider API key configured".into()))?;
        Ok(Self::new(config.base_url.clone(), api_key, config.stt_model.clone()))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        language: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| ProviderError::InvalidResponse(format!("multipart part: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "text");

        debug!(model = %self.model, filename, "Sending transcription request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Transcription request failed");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        // response_format=text returns the transcript as the raw body.
        let transcript = response
            .text()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("transcript body: {e}")))?;

        Ok(transcript.trim().to_string())
    }
}
