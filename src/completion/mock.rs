//! Scripted and always-failing providers for tests and offline runs.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::{ChatTurn, CompletionError, CompletionProvider};

/// Configurable provider that records what it was asked.
pub struct MockCompletionProvider {
    model_id: String,
    available: AtomicBool,
    response_content: Mutex<String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<(String, Vec<ChatTurn>)>>,
}

impl MockCompletionProvider {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            response_content: Mutex::new(
                "I hear you. What feels most present for you right now?".to_string(),
            ),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.set_response(content);
        self
    }

    pub fn set_response(&self, content: impl Into<String>) {
        *self.response_content.lock() = content.into();
    }

    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// System instructions and turns of the most recent call.
    pub fn last_request(&self) -> Option<(String, Vec<ChatTurn>)> {
        self.last_request.lock().clone()
    }
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn generate(
        &self,
        system_instructions: &str,
        messages: &[ChatTurn],
    ) -> Result<String, CompletionError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some((system_instructions.to_string(), messages.to_vec()));

        if !self.available.load(Ordering::SeqCst) {
            return Err(CompletionError::Unavailable(
                "mock provider disabled".to_string(),
            ));
        }
        Ok(self.response_content.lock().clone())
    }
}

/// Always fails. Chat runs in fallback mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProvider;

#[async_trait]
impl CompletionProvider for UnavailableProvider {
    fn id(&self) -> &str {
        "unavailable"
    }

    async fn generate(
        &self,
        _system_instructions: &str,
        _messages: &[ChatTurn],
    ) -> Result<String, CompletionError> {
        Err(CompletionError::Unavailable(
            "no completion provider configured".to_string(),
        ))
    }
}
