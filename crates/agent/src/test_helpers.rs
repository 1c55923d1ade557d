//! Shared test doubles for orchestration tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use careline_core::error::ProviderError;
use careline_core::provider::{ChatRequest, ChatResponse, Provider, Usage};

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue and records
/// the request for later assertions. Panics when more calls are made than
/// replies provided.
pub struct ScriptedProvider {
    replies: Vec<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: replies.into_iter().map(String::from).collect(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn single(reply: &str) -> Self {
        Self::new(vec![reply])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// All requests seen so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self
            .replies
            .get(index)
            .unwrap_or_else(|| {
                panic!(
                    "ScriptedProvider: no reply for call #{} (have {})",
                    index + 1,
                    self.replies.len()
                )
            })
            .clone();

        Ok(ChatResponse {
            content,
            model: "mock-model".into(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }
}

/// A provider whose every call fails with a timeout.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::Timeout("scripted failure".into()))
    }
}
