//! Common types for text generation.
//!
//! Every adapter accepts a [`GenerationRequest`] and normalizes whatever its
//! back-end returns into a [`GenerationResponse`] before handing it back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// One generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The user prompt.
    pub prompt: String,
    /// Model identifier as the provider lists it (aliases allowed).
    pub model: String,
    /// Generation cap; adapters apply their own default when unset.
    pub max_tokens: Option<u32>,
    /// Temperature (0.0–2.0).
    pub temperature: f32,
    /// Optional system prompt.
    pub system_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            max_tokens: None,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// A normalized generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated text.
    pub content: String,
    /// Model that served the call, as reported by the back-end.
    pub model: String,
    /// Registry name of the provider.
    pub provider: String,
    /// Input plus output tokens.
    pub tokens_used: u32,
    /// Estimated cost in USD.
    pub cost: f64,
    /// Provider-specific extras (stop reason, token split, ...).
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Token usage split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}
