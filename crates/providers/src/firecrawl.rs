//! Firecrawl scrape client, used only by the offline ingestion command.
//!
//! One call per plan page: POST `/v1/scrape` asking for markdown, return
//! the extracted page text.

use careline_core::error::ProviderError;
use serde::Deserialize;
use tracing::{debug, warn};

/// Client for the Firecrawl scraping API.
pub struct FirecrawlClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl FirecrawlClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Build from configuration; errors when no API key is available.
    pub fn from_config(config: &careline_config::FirecrawlConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("no Firecrawl API key configured".into()))?;
        Ok(Self::new(config.base_url.clone(), api_key))
    }

    /// Fetch one URL and return its content as markdown.
    pub async fn scrape_markdown(&self, page_url: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/scrape", self.base_url);

        let body = serde_json::json!({
            "url": page_url,
            "formats": ["markdown"],
        });

        debug!(page_url, "Scraping page");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
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
                "Invalid Firecrawl API key".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Scrape request failed");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("scrape payload: {e}")))?;

        if !api_response.success {
            return Err(ProviderError::ApiError {
                status_code: status,
                message: "scrape reported failure".into(),
            });
        }

        api_response
            .data
            .and_then(|d| d.markdown)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("scrape returned no markdown".into()))
    }
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapeData>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
}
