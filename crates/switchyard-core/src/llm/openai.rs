//! OpenAI-compatible API provider.
//!
//! Implements [`LlmProvider`] for OpenAI's Chat Completions API. Any service
//! following the same wire format (OpenRouter, Groq, Ollama, vLLM) works
//! through [`OpenAiProvider::compatible`].

use std::collections::BTreeMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::BoxFuture;

use super::provider::{LlmError, LlmProvider, check_status, require_key, validate_prompt};
use super::types::{GenerationRequest, GenerationResponse, Usage};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Models offered when none are configured, preferred first.
pub const DEFAULT_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"];

/// Blended USD per 1M tokens.
const COSTS: &[(&str, f64)] = &[
    ("gpt-4o", 2.50),
    ("gpt-4o-mini", 0.15),
    ("gpt-4-turbo", 10.00),
    ("gpt-4", 30.00),
    ("gpt-3.5-turbo", 0.50),
];

const DEFAULT_COST: f64 = 2.50;

/// Estimated USD cost of `tokens` total tokens on `model`.
pub fn estimate_cost(model: &str, tokens: u32) -> f64 {
    let rate = COSTS
        .iter()
        .find(|(name, _)| *name == model)
        .map_or(DEFAULT_COST, |(_, rate)| *rate);
    f64::from(tokens) / 1_000_000.0 * rate
}

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    client: Client,
    name: String,
    api_key: Zeroizing<String>,
    base_url: String,
    models: Vec<String>,
}

impl OpenAiProvider {
    /// Create a provider for api.openai.com; fails when `api_key` is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::new(),
            name: "openai".to_string(),
            api_key: require_key("openai", api_key.into())?,
            base_url: OPENAI_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        })
    }

    /// Create a provider for an OpenAI-compatible service.
    ///
    /// An empty `models` list keeps the OpenAI defaults.
    pub fn compatible(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        models: Vec<String>,
    ) -> Result<Self, LlmError> {
        let name = name.into();
        let api_key = require_key(&name, api_key.into())?;
        let mut provider = Self {
            client: Client::new(),
            name,
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        }
        .with_base_url(base_url);
        if !models.is_empty() {
            provider.models = models;
        }
        Ok(provider)
    }

    /// Set the registry name reported in responses.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Put `model` first in the model list.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.models.retain(|m| *m != model);
        self.models.insert(0, model);
        self
    }

    /// Replace the model list.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        if !models.is_empty() {
            self.models = models;
        }
        self
    }

    /// Set the API base URL (the part before `/chat/completions`).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Convert a generation request into OpenAI's API format.
    fn build_request_body(&self, request: &GenerationRequest) -> OpenAiRequest {
        let model = if request.model.is_empty() {
            self.models.first().cloned().unwrap_or_default()
        } else {
            request.model.clone()
        };

        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system_prompt {
            messages.push(OpenAiMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(OpenAiMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        OpenAiRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    /// Normalize OpenAI's response.
    fn parse_response(&self, resp: OpenAiResponse) -> Result<GenerationResponse, LlmError> {
        let choice = resp.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        let content = choice
            .message
            .content
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        let usage = resp
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "finish_reason".to_string(),
            choice
                .finish_reason
                .map_or(serde_json::Value::Null, Into::into),
        );
        metadata.insert("input_tokens".to_string(), usage.input_tokens.into());
        metadata.insert("output_tokens".to_string(), usage.output_tokens.into());

        Ok(GenerationResponse {
            content,
            cost: estimate_cost(&resp.model, usage.total()),
            model: resp.model,
            provider: self.name.clone(),
            tokens_used: usage.total(),
            metadata,
        })
    }
}

impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> BoxFuture<'_, Result<GenerationResponse, LlmError>> {
        let prepared = validate_prompt(request).map(|()| self.build_request_body(request));
        Box::pin(async move {
            let body = prepared?;
            debug!(provider = %self.name, model = %body.model, "OpenAI generate request");

            let resp = self
                .client
                .post(self.endpoint())
                .bearer_auth(self.api_key.as_str())
                .json(&body)
                .send()
                .await?;

            let api_resp: OpenAiResponse = check_status(resp)
                .await?
                .json()
                .await
                .map_err(|e| LlmError::Parse(e.to_string()))?;

            self.parse_response(api_resp)
        })
    }

    fn list_models(&self) -> Vec<String> {
        self.models.clone()
    }

    fn check_health(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ── OpenAI API types (private) ──────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
