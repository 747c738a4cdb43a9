//! Model router — pick one (provider, model) pair per request and dispatch.
//!
//! A request moves through `Classified → ProviderSelected → ModelSelected →
//! Dispatched → {Succeeded | Failed}` exactly once. A failed dispatch marks
//! that provider unavailable and is returned to the caller; no other
//! provider is tried for the same request.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use super::analyzer::{TaskAnalyzer, TaskComplexity, TaskType};
use super::provider::{LlmError, LlmProvider};
use super::registry::{ProviderHandle, ProviderRegistry};
use super::types::{DEFAULT_TEMPERATURE, GenerationRequest, GenerationResponse};

/// Complexity above which suitability is boosted.
const COMPLEX_TASK_THRESHOLD: f64 = 70.0;
const COMPLEX_TASK_BOOST: f64 = 1.1;
const UNLISTED_SUITABILITY: f64 = 0.5;

/// Per-model suitability, in [`TaskType::ALL`] order.
const SUITABILITY: &[(&str, [f64; 6])] = &[
    ("gpt-4o-mini", [0.80, 0.70, 0.90, 0.60, 0.80, 0.70]),
    ("gpt-4o", [0.95, 0.90, 0.95, 0.85, 0.90, 0.90]),
    ("gpt-4-turbo", [0.92, 0.88, 0.92, 0.82, 0.88, 0.88]),
    ("gpt-4", [0.90, 0.85, 0.90, 0.80, 0.85, 0.85]),
    ("gpt-3.5-turbo", [0.70, 0.60, 0.80, 0.55, 0.70, 0.70]),
    ("claude-opus-4", [0.97, 0.97, 0.96, 0.98, 0.93, 0.98]),
    ("claude-sonnet-4", [0.96, 0.93, 0.96, 0.96, 0.92, 0.96]),
    ("claude-3.5-sonnet", [0.93, 0.90, 0.95, 0.95, 0.88, 0.95]),
    ("claude-3.5-haiku", [0.82, 0.75, 0.88, 0.70, 0.80, 0.80]),
    ("claude-3-opus", [0.95, 0.95, 0.95, 0.98, 0.90, 0.98]),
    ("claude-3-sonnet", [0.90, 0.85, 0.95, 0.95, 0.85, 0.95]),
    ("claude-3-haiku", [0.75, 0.65, 0.85, 0.60, 0.75, 0.75]),
    ("deepseek-chat", [0.85, 0.80, 0.80, 0.75, 0.80, 0.75]),
];

/// Suitability of `model` for the analyzed task.
pub fn suitability(model: &str, complexity: &TaskComplexity) -> f64 {
    let column = TaskType::ALL
        .iter()
        .position(|t| *t == complexity.task_type)
        .unwrap_or_default();
    let base = SUITABILITY
        .iter()
        .find(|(name, _)| *name == model)
        .map_or(UNLISTED_SUITABILITY, |(_, scores)| scores[column]);
    if complexity.score > COMPLEX_TASK_THRESHOLD {
        base * COMPLEX_TASK_BOOST
    } else {
        base
    }
}

/// Errors from routing a request.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("no available providers")]
    NoAvailableProvider,

    #[error("provider {provider} has no available models")]
    NoModels { provider: String },

    #[error("provider {provider} failed: {source}")]
    Dispatch {
        provider: String,
        #[source]
        source: LlmError,
    },
}

impl RouteError {
    /// Name of the provider the error is attributed to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            RouteError::NoAvailableProvider => None,
            RouteError::NoModels { provider } | RouteError::Dispatch { provider, .. } => {
                Some(provider)
            }
        }
    }
}

/// One request to route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub query: String,
    /// Rendered context placed before the query in the prompt. Not analyzed.
    pub context: Option<String>,
    /// Estimated tokens of context that accompany the query.
    pub context_tokens: usize,
    pub preferred_model: Option<String>,
    pub preferred_provider: Option<String>,
    /// Overrides the task-type system prompt.
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: f32,
}

impl RouteRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: None,
            context_tokens: 0,
            preferred_model: None,
            preferred_provider: None,
            system_prompt: None,
            max_tokens: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_context_tokens(mut self, tokens: usize) -> Self {
        self.context_tokens = tokens;
        self
    }

    pub fn with_preferred_model(mut self, model: impl Into<String>) -> Self {
        self.preferred_model = Some(model.into());
        self
    }

    pub fn with_preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// The chosen (provider, model) pair and the analysis behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub provider: String,
    pub model: String,
    pub complexity: TaskComplexity,
}

/// A successful routed call.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedResponse {
    pub decision: RouteDecision,
    pub response: GenerationResponse,
}

/// Routes requests over a shared [`ProviderRegistry`].
#[derive(Debug)]
pub struct ModelRouter {
    registry: Arc<ProviderRegistry>,
    analyzer: TaskAnalyzer,
}

impl ModelRouter {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            analyzer: TaskAnalyzer::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Classify `query`.
    pub fn analyze(&self, query: &str, context_tokens: usize) -> TaskComplexity {
        self.analyzer.analyze(query, context_tokens)
    }

    /// Choose a provider and model without dispatching.
    ///
    /// An available `preferred_provider` wins; otherwise the first available
    /// provider in priority order is used.
    pub fn select(
        &self,
        complexity: &TaskComplexity,
        preferred_model: Option<&str>,
        preferred_provider: Option<&str>,
    ) -> Result<RouteDecision, RouteError> {
        let name = preferred_provider
            .filter(|p| self.registry.is_available(p))
            .map(str::to_string)
            .or_else(|| self.registry.available_providers().into_iter().next())
            .ok_or(RouteError::NoAvailableProvider)?;
        let provider = self
            .registry
            .get(&name)
            .ok_or(RouteError::NoAvailableProvider)?;

        let model = pick_model(provider.as_ref(), complexity, preferred_model)
            .ok_or_else(|| RouteError::NoModels {
                provider: name.clone(),
            })?;

        Ok(RouteDecision {
            provider: name,
            model,
            complexity: *complexity,
        })
    }

    /// Classify, select, and dispatch exactly one generation call.
    pub async fn route(&self, request: &RouteRequest) -> Result<RoutedResponse, RouteError> {
        let complexity = self.analyze(&request.query, request.context_tokens);
        debug!(
            task_type = %complexity.task_type,
            complexity = complexity.score,
            "task analyzed"
        );

        let decision = self.select(
            &complexity,
            request.preferred_model.as_deref(),
            request.preferred_provider.as_deref(),
        )?;
        let provider: ProviderHandle = self
            .registry
            .get(&decision.provider)
            .ok_or(RouteError::NoAvailableProvider)?;
        info!(provider = %decision.provider, model = %decision.model, "routing request");

        let system_prompt = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| complexity.task_type.system_prompt().to_string());
        let prompt = match request.context {
            Some(ref context) => format!("{context}{}", request.query),
            None => request.query.clone(),
        };
        let mut generation = GenerationRequest::new(prompt, decision.model.clone())
            .with_temperature(request.temperature)
            .with_system_prompt(system_prompt);
        generation.max_tokens = request.max_tokens;

        match provider.generate(&generation).await {
            Ok(response) => Ok(RoutedResponse { decision, response }),
            Err(e) => {
                error!(provider = %decision.provider, error = %e, "provider failed");
                self.registry.mark_failed(&decision.provider, &e.to_string());
                Err(RouteError::Dispatch {
                    provider: decision.provider,
                    source: e,
                })
            }
        }
    }
}

/// Preferred model if the provider accepts it, else the provider's best-suited
/// model, else its first listed one.
fn pick_model(
    provider: &dyn LlmProvider,
    complexity: &TaskComplexity,
    preferred: Option<&str>,
) -> Option<String> {
    if let Some(model) = preferred
        && provider.is_model_available(model)
    {
        return Some(model.to_string());
    }

    let models = provider.list_models();
    let mut best: Option<(&String, f64)> = None;
    for model in &models {
        let score = suitability(model, complexity);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((model, score));
        }
    }
    best.map(|(model, _)| model.clone())
}
