//! Anthropic Claude API provider.
//!
//! Implements [`LlmProvider`] for the Anthropic Messages API
//! (`/v1/messages`). Short model aliases resolve to dated model ids.

use std::collections::BTreeMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::BoxFuture;

use super::provider::{LlmError, LlmProvider, check_status, require_key, validate_prompt};
use super::types::{GenerationRequest, GenerationResponse, Usage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Default model alias.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4";

/// Generation cap when the request sets none (the API requires one).
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// A known Claude model: alias, dated id, and USD per 1M input/output tokens.
struct ClaudeModel {
    alias: &'static str,
    id: &'static str,
    input_cost: f64,
    output_cost: f64,
}

const MODELS: &[ClaudeModel] = &[
    ClaudeModel {
        alias: "claude-sonnet-4",
        id: "claude-sonnet-4-20250514",
        input_cost: 3.0,
        output_cost: 15.0,
    },
    ClaudeModel {
        alias: "claude-opus-4",
        id: "claude-opus-4-20250514",
        input_cost: 15.0,
        output_cost: 75.0,
    },
    ClaudeModel {
        alias: "claude-3.5-sonnet",
        id: "claude-3-5-sonnet-20241022",
        input_cost: 3.0,
        output_cost: 15.0,
    },
    ClaudeModel {
        alias: "claude-3.5-haiku",
        id: "claude-3-5-haiku-20241022",
        input_cost: 0.8,
        output_cost: 4.0,
    },
    ClaudeModel {
        alias: "claude-3-opus",
        id: "claude-3-opus-20240229",
        input_cost: 15.0,
        output_cost: 75.0,
    },
    ClaudeModel {
        alias: "claude-3-sonnet",
        id: "claude-3-sonnet-20240229",
        input_cost: 3.0,
        output_cost: 15.0,
    },
    ClaudeModel {
        alias: "claude-3-haiku",
        id: "claude-3-haiku-20240307",
        input_cost: 0.25,
        output_cost: 1.25,
    },
];

fn lookup(model: &str) -> Option<&'static ClaudeModel> {
    MODELS.iter().find(|m| m.alias == model || m.id == model)
}

/// Dated model id for an alias; other names pass through unchanged.
pub fn resolve_model(model: &str) -> &str {
    lookup(model).map_or(model, |m| m.id)
}

/// Estimated USD cost of a call. Unknown models are priced like Sonnet.
pub fn estimate_cost(model: &str, usage: Usage) -> f64 {
    let (input, output) = lookup(model).map_or((3.0, 15.0), |m| (m.input_cost, m.output_cost));
    (f64::from(usage.input_tokens) * input + f64::from(usage.output_tokens) * output) / 1_000_000.0
}

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: Client,
    name: String,
    api_key: Zeroizing<String>,
    api_url: String,
    default_model: String,
    models: Vec<String>,
}

impl AnthropicProvider {
    /// Create a provider; fails when `api_key` is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::new(),
            name: "anthropic".to_string(),
            api_key: require_key("anthropic", api_key.into())?,
            api_url: ANTHROPIC_API_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            models: MODELS.iter().map(|m| m.alias.to_string()).collect(),
        })
    }

    /// Set the registry name reported in responses.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Restrict the provider to `models`; the first becomes the default.
    ///
    /// An empty list keeps the built-in aliases.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        if let Some(first) = models.first() {
            self.default_model = first.clone();
            self.models = models;
        }
        self
    }

    /// Override the Messages endpoint (proxies, gateways).
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.api_url = format!("{}/v1/messages", base_url.as_ref().trim_end_matches('/'));
        self
    }

    /// Convert a generation request into Anthropic's API format.
    fn build_request_body(&self, request: &GenerationRequest) -> AnthropicRequest {
        let model = if request.model.is_empty() {
            &self.default_model
        } else {
            &request.model
        };

        AnthropicRequest {
            model: resolve_model(model).to_string(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request.system_prompt.clone(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: request.prompt.clone(),
            }],
            temperature: request.temperature,
        }
    }

    /// Normalize Anthropic's response.
    fn parse_response(&self, resp: AnthropicResponse) -> Result<GenerationResponse, LlmError> {
        let content: String = resp
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicBlock::Text { text } => Some(text.as_str()),
                AnthropicBlock::Other => None,
            })
            .collect();
        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let usage = Usage {
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
        };
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "stop_reason".to_string(),
            resp.stop_reason.map_or(serde_json::Value::Null, Into::into),
        );
        metadata.insert("input_tokens".to_string(), usage.input_tokens.into());
        metadata.insert("output_tokens".to_string(), usage.output_tokens.into());

        Ok(GenerationResponse {
            content,
            cost: estimate_cost(&resp.model, usage),
            model: resp.model,
            provider: self.name.clone(),
            tokens_used: usage.total(),
            metadata,
        })
    }
}

impl LlmProvider for AnthropicProvider {
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
            debug!(provider = %self.name, model = %body.model, "Anthropic generate request");

            let resp = self
                .client
                .post(&self.api_url)
                .header("x-api-key", self.api_key.as_str())
                .header("anthropic-version", ANTHROPIC_API_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await?;

            let api_resp: AnthropicResponse = check_status(resp)
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

    /// Listed models match by alias or dated id.
    fn is_model_available(&self, model: &str) -> bool {
        let wanted = resolve_model(model);
        self.models.iter().any(|m| resolve_model(m) == wanted)
    }

    fn check_health(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ── Anthropic API types (private) ───────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("test-key").unwrap()
    }

    #[test]
    fn test_blank_key_is_rejected() {
        let err = AnthropicProvider::new("").err().unwrap();
        assert!(matches!(err, LlmError::MissingCredentials { .. }));
    }

    #[test]
    fn test_build_request_resolves_alias() {
        let request = GenerationRequest::new("Hello!", "claude-3.5-haiku")
            .with_system_prompt("You are terse.")
            .with_max_tokens(1024);

        let body = provider().build_request_body(&request);
        assert_eq!(body.model, "claude-3-5-haiku-20241022");
        assert_eq!(body.max_tokens, 1024);
        assert_eq!(body.system.as_deref(), Some("You are terse."));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
        assert_eq!(body.messages[0].content, "Hello!");
    }

    #[test]
    fn test_default_model_and_max_tokens() {
        let body = provider().build_request_body(&GenerationRequest::new("hi", ""));
        assert_eq!(body.model, "claude-sonnet-4-20250514");
        assert_eq!(body.max_tokens, DEFAULT_MAX_TOKENS);

        let custom = provider().with_model("claude-opus-4");
        let body = custom.build_request_body(&GenerationRequest::new("hi", ""));
        assert_eq!(body.model, "claude-opus-4-20250514");
    }

    #[test]
    fn test_unknown_model_passes_through() {
        assert_eq!(resolve_model("claude-next"), "claude-next");
        assert_eq!(resolve_model("claude-3-opus"), "claude-3-opus-20240229");
    }

    #[test]
    fn test_parse_text_response() {
        let api_resp: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Hello! "},
                {"type": "text", "text": "How can I help?"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1000, "output_tokens": 200}
        }))
        .unwrap();

        let resp = provider().with_name("claude").parse_response(api_resp).unwrap();
        assert_eq!(resp.content, "Hello! How can I help?");
        assert_eq!(resp.provider, "claude");
        assert_eq!(resp.tokens_used, 1200);
        assert!((resp.cost - (1000.0 * 3.0 + 200.0 * 15.0) / 1_000_000.0).abs() < 1e-12);
        assert_eq!(resp.metadata["stop_reason"], "end_turn");
        assert_eq!(resp.metadata["output_tokens"], 200);
    }

    #[test]
    fn test_parse_empty_response() {
        let api_resp: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "model": "claude-3-haiku-20240307",
            "content": [],
            "stop_reason": null,
            "usage": {"input_tokens": 5, "output_tokens": 0}
        }))
        .unwrap();
        assert!(matches!(
            provider().parse_response(api_resp),
            Err(LlmError::EmptyResponse)
        ));
    }

    #[test]
    fn test_model_catalog() {
        let p = provider();
        assert_eq!(p.list_models()[0], "claude-sonnet-4");
        assert!(p.is_model_available("claude-3-haiku"));
        assert!(p.is_model_available("claude-3-haiku-20240307"));
        assert!(!p.is_model_available("gpt-4o"));
        assert!(p.check_health());
    }

    #[test]
    fn test_configured_models_replace_catalog() {
        let p = provider().with_models(vec![
            "claude-sonnet-4-5".to_string(),
            "claude-3-haiku".to_string(),
        ]);
        assert_eq!(p.list_models(), vec!["claude-sonnet-4-5", "claude-3-haiku"]);
        assert!(p.is_model_available("claude-sonnet-4-5"));
        assert!(p.is_model_available("claude-3-haiku-20240307"));
        assert!(!p.is_model_available("claude-opus-4"));

        let body = p.build_request_body(&GenerationRequest::new("hi", ""));
        assert_eq!(body.model, "claude-sonnet-4-5");

        // an empty list keeps the built-in aliases
        let p = provider().with_models(Vec::new());
        assert_eq!(p.list_models().len(), 7);
    }

    #[test]
    fn test_estimate_cost() {
        let usage = Usage {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
        };
        assert_eq!(estimate_cost("claude-3-haiku", usage), 1.5);
        assert_eq!(estimate_cost("claude-opus-4-20250514", usage), 90.0);
        assert_eq!(estimate_cost("unknown", usage), 18.0);
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_prompt() {
        let err = provider()
            .generate(&GenerationRequest::new("   ", "claude-sonnet-4"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidPrompt));
    }
}
