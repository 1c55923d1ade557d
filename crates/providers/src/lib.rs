//! Outbound HTTP clients for Careline.
//!
//! - [`openai::OpenAiChatProvider`] — chat completions against any
//!   OpenAI-compatible endpoint
//! - [`whisper::WhisperTranscriber`] — audio transcription
//! - [`firecrawl::FirecrawlClient`] — page scraping for the offline
//!   ingestion command

pub mod firecrawl;
pub mod openai;
pub mod whisper;

pub use firecrawl::FirecrawlClient;
pub use openai::OpenAiChatProvider;
pub use whisper::WhisperTranscriber;
