//! LLM provider routing — one request, one provider, no silent substitution.
//!
//! Switchyard talks to back-ends through the [`LlmProvider`] trait.
//! Currently supported:
//!
//! - **Anthropic** — Claude models via the Messages API
//! - **OpenAI** — GPT models via the Chat Completions API
//! - **OpenAI-compatible** — OpenRouter, Groq, Ollama, vLLM and friends
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐
//! │ TaskAnalyzer │───▶│ ModelRouter  │───▶│ ProviderRegistry │
//! └──────────────┘    └──────────────┘    └────────┬─────────┘
//!                                                  │
//!                              ┌───────────────────┼──────────────┐
//!                              ▼                   ▼              ▼
//!                     ┌──────────────┐    ┌──────────────┐ ┌────────────┐
//!                     │  Anthropic   │    │    OpenAI    │ │ Compatible │
//!                     └──────────────┘    └──────────────┘ └────────────┘
//! ```

pub mod analyzer;
pub mod anthropic;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod router;
pub mod types;

use std::sync::Arc;

use switchyard_config::{AppConfig, ProviderConfig, ProviderKind};

pub use analyzer::{ContextSize, ReasoningDepth, TaskAnalyzer, TaskComplexity, TaskType};
pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use provider::{LlmError, LlmProvider};
pub use registry::{ProviderHandle, ProviderRegistry, ProviderStatus};
pub use router::{ModelRouter, RouteDecision, RouteError, RouteRequest, RoutedResponse};
pub use types::*;

/// Build the provider described by one `[providers.<name>]` entry.
///
/// Fails with [`LlmError::MissingCredentials`] when no key resolves.
pub fn provider_from_config(name: &str, config: &ProviderConfig) -> Result<ProviderHandle, LlmError> {
    provider_from_config_with(name, config, |var| std::env::var(var).ok())
}

/// Like [`provider_from_config`], with a custom environment lookup.
pub fn provider_from_config_with(
    name: &str,
    config: &ProviderConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ProviderHandle, LlmError> {
    let api_key = config.resolve_api_key_with(name, lookup).unwrap_or_default();

    let provider: ProviderHandle = match config.kind {
        ProviderKind::Anthropic => {
            let mut provider = AnthropicProvider::new(api_key)
                .map_err(|_| missing(name))?
                .with_name(name)
                .with_models(config.models.clone());
            if let Some(ref base_url) = config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
        ProviderKind::OpenAi => {
            let mut provider = OpenAiProvider::new(api_key)
                .map_err(|_| missing(name))?
                .with_name(name)
                .with_models(config.models.clone());
            if let Some(ref base_url) = config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
        ProviderKind::OpenAiCompatible => {
            let base_url = config
                .base_url
                .clone()
                .ok_or_else(|| LlmError::Request(format!("{name}: base_url is required")))?;
            Arc::new(OpenAiProvider::compatible(
                name,
                base_url,
                api_key,
                config.models.clone(),
            )?)
        }
    };
    Ok(provider)
}

fn missing(name: &str) -> LlmError {
    LlmError::MissingCredentials {
        provider: name.to_string(),
    }
}

/// Register every configured provider; entries without credentials are skipped.
///
/// The preferred provider is registered at priority 0.
pub fn registry_from_config(config: &AppConfig) -> ProviderRegistry {
    registry_from_config_with(config, |var| std::env::var(var).ok())
}

/// Like [`registry_from_config`], with a custom environment lookup.
pub fn registry_from_config_with(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ProviderRegistry {
    let registry = ProviderRegistry::new();
    for (name, entry) in &config.providers {
        let priority = config.provider_priority(name).unwrap_or(entry.priority);
        registry.register(
            name,
            || provider_from_config_with(name, entry, &lookup),
            priority,
        );
    }
    registry
}
