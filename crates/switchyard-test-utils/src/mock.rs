//! Scripted provider for registry and router tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::debug;
use switchyard_core::BoxFuture;
use switchyard_core::llm::{GenerationRequest, GenerationResponse, LlmError, LlmProvider};

/// A provider that answers locally.
///
/// Responses echo the prompt unless a fixed reply is set. Failure can be
/// toggled at any time; every `generate` call is counted and recorded.
pub struct MockProvider {
    name: String,
    models: Vec<String>,
    reply: Option<String>,
    fail: AtomicBool,
    healthy: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            models: vec![format!("{name}-model")],
            reply: None,
            fail: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = Some(reply.to_string());
        self
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Wrap in an `Arc` for registration.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> BoxFuture<'_, Result<GenerationResponse, LlmError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let request = request.clone();
        debug!(provider = %self.name, model = %request.model, "mock generate");
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(LlmError::ProviderError {
                    status: 503,
                    message: format!("{} is scripted to fail", self.name),
                });
            }
            let content = self.reply.clone().unwrap_or_else(|| request.prompt.clone());
            let tokens_used = (request.prompt.len() + content.len()) as u32 / 4;
            Ok(GenerationResponse {
                content,
                model: request.model,
                provider: self.name.clone(),
                tokens_used,
                cost: 0.0,
                metadata: BTreeMap::new(),
            })
        })
    }

    fn list_models(&self) -> Vec<String> {
        self.models.clone()
    }

    fn check_health(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
