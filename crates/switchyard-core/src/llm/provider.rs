//! LLM provider trait — one text-generation capability per back-end.
//!
//! Adapters (Anthropic, OpenAI and OpenAI-compatible services) implement
//! [`LlmProvider`]; the registry and router only ever see the trait.

use crate::BoxFuture;

use super::types::{GenerationRequest, GenerationResponse};

/// Errors from provider construction and generation calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no API key configured for {provider}")]
    MissingCredentials { provider: String },

    #[error("API request failed: {0}")]
    Request(String),

    #[error("authentication failed (check API key): {0}")]
    Auth(String),

    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("provider error: {status}: {message}")]
    ProviderError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout")]
    Timeout,

    #[error("response contained no text")]
    EmptyResponse,

    #[error("prompt is empty")]
    InvalidPrompt,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::Parse(e.to_string())
        } else if e.is_builder() {
            LlmError::Request(e.to_string())
        } else {
            LlmError::Network(e.to_string())
        }
    }
}

/// Core trait for text-generation back-ends.
///
/// Implementations must be `Send + Sync` so handles can be shared across
/// concurrent requests. Uses `BoxFuture` for object safety.
pub trait LlmProvider: Send + Sync {
    /// Registry name (e.g. "anthropic", "groq").
    fn name(&self) -> &str;

    /// Perform one generation call.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> BoxFuture<'_, Result<GenerationResponse, LlmError>>;

    /// Model identifiers this provider accepts, preferred first.
    fn list_models(&self) -> Vec<String>;

    /// Whether `model` is accepted by this provider.
    fn is_model_available(&self, model: &str) -> bool {
        self.list_models().iter().any(|m| m == model)
    }

    /// Local health predicate. Must not perform network I/O.
    fn check_health(&self) -> bool;
}

/// Reject empty prompts before any network call.
pub(crate) fn validate_prompt(request: &GenerationRequest) -> Result<(), LlmError> {
    if request.prompt.trim().is_empty() {
        return Err(LlmError::InvalidPrompt);
    }
    Ok(())
}

/// Map a non-success HTTP status to an [`LlmError`].
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = resp.status().as_u16();
    match status {
        200..=299 => Ok(resp),
        401 | 403 => Err(LlmError::Auth(resp.text().await.unwrap_or_default())),
        404 => Err(LlmError::ModelNotFound(resp.text().await.unwrap_or_default())),
        429 => {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            Err(LlmError::RateLimited {
                retry_after_secs: retry_after,
            })
        }
        _ => Err(LlmError::ProviderError {
            status,
            message: resp.text().await.unwrap_or_default(),
        }),
    }
}

/// Require a non-blank credential.
pub(crate) fn require_key(provider: &str, api_key: String) -> Result<zeroize::Zeroizing<String>, LlmError> {
    if api_key.trim().is_empty() {
        return Err(LlmError::MissingCredentials {
            provider: provider.to_string(),
        });
    }
    Ok(zeroize::Zeroizing::new(api_key))
}
