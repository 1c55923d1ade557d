//! Configuration loading, validation, and management for Careline.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. Everything policy-like that used to be an embedded literal in
//! the original service — escalation keyword lists, reply templates, prompt
//! overrides — lives here so a policy change never requires a redeploy.
//! Components receive an explicit `AppConfig` at construction time; there
//! are no implicit singletons.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `careline.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// LLM / STT provider settings
    #[serde(default)]
    pub provider: LlmConfig,

    /// Relational database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Vector document store settings
    #[serde(default)]
    pub document_store: DocStoreConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Crawling service settings (ingestion only)
    #[serde(default)]
    pub firecrawl: FirecrawlConfig,

    /// Escalation keyword lists and reply templates
    #[serde(default)]
    pub escalation: EscalationPolicy,

    /// Optional prompt template overrides
    #[serde(default)]
    pub prompts: PromptOverrides,

    /// Plan pages for the offline ingestion command
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("database", &self.database)
            .field("document_store", &self.document_store)
            .field("gateway", &self.gateway)
            .field("firecrawl", &self.firecrawl)
            .field("escalation", &self.escalation)
            .field("prompts", &self.prompts)
            .field("ingest", &self.ingest)
            .finish()
    }
}

/// LLM and speech-to-text provider configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; `OPENAI_API_KEY` / `CARELINE_API_KEY` override this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat model used for consultation turns and summaries.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Transcription model.
    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// Model used for structured extraction during ingestion.
    #[serde(default = "default_chat_model")]
    pub extraction_model: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4".into()
}
fn default_stt_model() -> String {
    "whisper-1".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            stt_model: default_stt_model(),
            extraction_model: default_chat_model(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("stt_model", &self.stt_model)
            .field("extraction_model", &self.extraction_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL. The file is created when missing.
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://careline.db".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocStoreConfig {
    /// Base URL of the Chroma-compatible vector database.
    #[serde(default = "default_docstore_url")]
    pub url: String,

    /// Collection holding the plan documents.
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_docstore_url() -> String {
    "http://localhost:8000".into()
}
fn default_collection() -> String {
    "plans".into()
}

impl Default for DocStoreConfig {
    fn default() -> Self {
        Self {
            url: default_docstore_url(),
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by the CORS layer.
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_origins() -> Vec<String> {
    vec!["http://localhost:3000".into(), "http://127.0.0.1:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_origins(),
        }
    }
}

/// Firecrawl configuration, used only by `careline ingest`.
#[derive(Clone, Serialize, Deserialize)]
pub struct FirecrawlConfig {
    /// API key; `FIRECRAWL_API_KEY` overrides this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_firecrawl_url")]
    pub base_url: String,
}

fn default_firecrawl_url() -> String {
    "https://api.firecrawl.dev".into()
}

impl Default for FirecrawlConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_firecrawl_url(),
        }
    }
}

impl std::fmt::Debug for FirecrawlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirecrawlConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Escalation policy: category → keyword list → reply template.
///
/// Both lists are matched case-insensitively as substrings, in order;
/// the direct-request list always takes priority over the policy list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Phrases asking for a human agent outright.
    #[serde(default = "default_direct_keywords")]
    pub direct_keywords: Vec<String>,

    /// Fixed hand-off notice returned on a direct request.
    #[serde(default = "default_direct_reply")]
    pub direct_reply: String,

    /// Topics the assistant must not handle (identity changes, billing,
    /// loss reports, cancellations, ...).
    #[serde(default = "default_policy_keywords")]
    pub policy_keywords: Vec<String>,

    /// Notice template for policy topics; `{keyword}` names the match.
    #[serde(default = "default_policy_reply")]
    pub policy_reply_template: String,
}

fn default_direct_keywords() -> Vec<String> {
    [
        "상담원 연결",
        "상담원",
        "상담사",
        "사람",
        "직원",
        "실제 상담",
        "사람과 통화",
        "상담원 연결해줘",
        "상담원이랑",
        "담당자",
    ]
    .map(String::from)
    .to_vec()
}

fn default_direct_reply() -> String {
    "상담원 연결을 요청하셨습니다. 잠시 후 전문 상담원과 연결해 드리겠습니다. 감사합니다.".into()
}

fn default_policy_keywords() -> Vec<String> {
    [
        "명의 변경",
        "명의변경",
        "요금 납부",
        "요금납부",
        "분실 신고",
        "분실신고",
        "해지",
        "번호 변경",
        "번호변경",
        "기기 변경",
        "기기변경",
        "a/s",
        "수리",
        "청구서",
        "미납",
        "연체",
        "위약금",
        "계약 해지",
    ]
    .map(String::from)
    .to_vec()
}

fn default_policy_reply() -> String {
    "'{keyword}' 관련 문의는 전문 상담원의 도움이 필요합니다. 상담원 연결을 원하시면 '상담원 연결'이라고 말씀해 주세요.".into()
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            direct_keywords: default_direct_keywords(),
            direct_reply: default_direct_reply(),
            policy_keywords: default_policy_keywords(),
            policy_reply_template: default_policy_reply(),
        }
    }
}

/// Optional overrides for the embedded prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptOverrides {
    /// Consultation system prompt (persona + escalation-offer guidance).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Summarization instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Plan pages crawled by `careline ingest`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IngestConfig {
    #[serde(default)]
    pub sources: Vec<PlanSource>,
}

/// One plan detail page to crawl and extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSource {
    pub name: String,
    pub url: String,
}

impl AppConfig {
    /// Load configuration from the default path (`./careline.toml`),
    /// falling back to `CARELINE_CONFIG` when set.
    ///
    /// Environment overrides applied afterwards:
    /// - `CARELINE_API_KEY` / `OPENAI_API_KEY` → provider key
    /// - `FIRECRAWL_API_KEY` → crawler key
    /// - `CARELINE_DATABASE_URL` → database URL
    /// - `CARELINE_CHAT_MODEL` → chat model
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CARELINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("careline.toml"));
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = std::env::var("CARELINE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if self.firecrawl.api_key.is_none() {
            self.firecrawl.api_key = std::env::var("FIRECRAWL_API_KEY").ok();
        }
        if let Ok(url) = std::env::var("CARELINE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(model) = std::env::var("CARELINE_CHAT_MODEL") {
            self.provider.chat_model = model;
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.escalation.direct_keywords.is_empty() {
            return Err(ConfigError::ValidationError(
                "escalation.direct_keywords must not be empty".into(),
            ));
        }
        if self.escalation.policy_keywords.is_empty() {
            return Err(ConfigError::ValidationError(
                "escalation.policy_keywords must not be empty".into(),
            ));
        }
        if !self.escalation.policy_reply_template.contains("{keyword}") {
            return Err(ConfigError::ValidationError(
                "escalation.policy_reply_template must contain a {keyword} placeholder".into(),
            ));
        }
        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError("gateway.port must be non-zero".into()));
        }
        Ok(())
    }

    /// Check if a provider API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for careline_core::Error {
    fn from(e: ConfigError) -> Self {
        careline_core::Error::Config { message: e.to_string() }
    }
}
