#![deny(unsafe_code)]

//! Configuration loading and validation for Switchyard.
//!
//! Loads TOML configuration files and validates them against expected ranges.
//! Provides the [`AppConfig`] type as the central configuration structure:
//! context-assembly limits, model preferences, per-provider settings and logging.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound accepted for `context.max_files`.
pub const MAX_FILES_LIMIT: usize = 500;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context assembly configuration.
    #[serde(default)]
    pub context: ContextConfig,

    /// Model and provider preferences.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Provider back-ends, keyed by provider name.
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            context: ContextConfig::default(),
            models: ModelsConfig::default(),
            providers: default_providers(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Limits for context assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum number of files included with full content.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Total estimated-token budget of the context window.
    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: u32,

    /// Tokens held back from the budget for prompt and response overhead.
    #[serde(default = "default_reserved_tokens")]
    pub reserved_tokens: u32,

    /// Summarize medium-relevance files instead of dropping them.
    #[serde(default)]
    pub use_summaries: bool,

    /// Exclusion patterns added to the built-in set.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_tokens: default_context_max_tokens(),
            reserved_tokens: default_reserved_tokens(),
            use_summaries: false,
            exclude: Vec::new(),
        }
    }
}

fn default_max_files() -> usize {
    50
}

fn default_context_max_tokens() -> u32 {
    120_000
}

fn default_reserved_tokens() -> u32 {
    2000
}

/// Model and provider preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Provider to try first. Registered at priority 0.
    #[serde(default)]
    pub preferred_provider: Option<String>,

    /// Model to use when the selected provider supports it.
    #[serde(default)]
    pub preferred_model: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional cap on generated tokens.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            preferred_provider: None,
            preferred_model: None,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

/// Which adapter a provider entry is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Anthropic Messages API.
    #[serde(rename = "anthropic")]
    Anthropic,
    /// OpenAI Chat Completions API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Any service speaking the OpenAI Chat Completions format.
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
}

/// Settings for one provider back-end.
///
/// ## TOML Example
///
/// ```toml
/// [providers.groq]
/// kind = "openai-compatible"
/// base_url = "https://api.groq.com/openai/v1"
/// priority = 7
/// models = ["llama-3.3-70b-versatile"]
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Adapter kind.
    pub kind: ProviderKind,

    /// Inline API key. Prefer `SWITCHYARD_<NAME>_API_KEY` in the environment.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Endpoint override (required for `openai-compatible`).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Fallback priority (lower = tried first).
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Model list override. Empty means the adapter's built-in list.
    #[serde(default)]
    pub models: Vec<String>,
}

impl ProviderConfig {
    /// A provider entry of the given kind with default settings.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            base_url: None,
            priority: default_priority(),
            models: Vec::new(),
        }
    }

    /// Resolve the API key for provider `name` from the process environment.
    pub fn resolve_api_key(&self, name: &str) -> Option<String> {
        self.resolve_api_key_with(name, |var| std::env::var(var).ok())
    }

    /// Resolve the API key using a custom variable lookup.
    ///
    /// Order: inline `api_key`, `SWITCHYARD_<NAME>_API_KEY`, `<NAME>_API_KEY`.
    /// Empty values count as absent.
    pub fn resolve_api_key_with(
        &self,
        name: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            debug!(provider = name, source = "inline", "Resolved API key");
            return Some(key.clone());
        }
        let upper = name.to_uppercase().replace('-', "_");
        for var in [format!("SWITCHYARD_{upper}_API_KEY"), format!("{upper}_API_KEY")] {
            if let Some(key) = lookup(&var).filter(|k| !k.trim().is_empty()) {
                debug!(provider = name, source = %var, "Resolved API key");
                return Some(key);
            }
        }
        None
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("priority", &self.priority)
            .field("models", &self.models)
            .finish()
    }
}

fn default_priority() -> u32 {
    5
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    BTreeMap::from([
        (
            "anthropic".to_string(),
            ProviderConfig::new(ProviderKind::Anthropic),
        ),
        ("openai".to_string(), ProviderConfig::new(ProviderKind::OpenAi)),
    ])
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective priority of a provider: the preferred provider always gets 0.
    pub fn provider_priority(&self, name: &str) -> Option<u32> {
        let entry = self.providers.get(name)?;
        if self.models.preferred_provider.as_deref() == Some(name) {
            Some(0)
        } else {
            Some(entry.priority)
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctx = &self.context;
        if !(1..=MAX_FILES_LIMIT).contains(&ctx.max_files) {
            return Err(ConfigError::Validation(format!(
                "context.max_files must be in 1..={MAX_FILES_LIMIT}, got {}",
                ctx.max_files
            )));
        }
        if !(1000..=1_000_000).contains(&ctx.max_tokens) {
            return Err(ConfigError::Validation(format!(
                "context.max_tokens must be in 1000..=1000000, got {}",
                ctx.max_tokens
            )));
        }
        if ctx.reserved_tokens >= ctx.max_tokens {
            return Err(ConfigError::Validation(format!(
                "context.reserved_tokens ({}) must be less than context.max_tokens ({})",
                ctx.reserved_tokens, ctx.max_tokens
            )));
        }
        if ctx.exclude.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "context.exclude must not contain empty patterns".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.models.temperature) {
            return Err(ConfigError::Validation(format!(
                "models.temperature must be in [0.0, 2.0], got {}",
                self.models.temperature
            )));
        }
        if self.models.max_tokens == Some(0) {
            return Err(ConfigError::Validation(
                "models.max_tokens must be non-zero when set".to_string(),
            ));
        }
        for (field, value) in [
            ("preferred_provider", &self.models.preferred_provider),
            ("preferred_model", &self.models.preferred_model),
        ] {
            if value.as_ref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "models.{field} must not be empty when set"
                )));
            }
        }

        for (name, provider) in &self.providers {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "provider names must not be empty".to_string(),
                ));
            }
            if provider.kind == ProviderKind::OpenAiCompatible && provider.base_url.is_none() {
                return Err(ConfigError::Validation(format!(
                    "providers.{name}.base_url is required when kind is \"openai-compatible\""
                )));
            }
            if provider.models.iter().any(|m| m.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "providers.{name}.models must not contain empty names"
                )));
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.context.max_files, 50);
        assert_eq!(config.context.max_tokens, 120_000);
        assert_eq!(config.context.reserved_tokens, 2000);
        assert!(!config.context.use_summaries);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers["anthropic"].kind, ProviderKind::Anthropic);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.context.max_files, 50);
        let names: Vec<&str> = config.providers.keys().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["anthropic", "openai"]);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [context]
            max_files = 20
            max_tokens = 64000
            reserved_tokens = 4000
            use_summaries = true
            exclude = ["fixtures", "*.snap"]

            [models]
            preferred_provider = "groq"
            preferred_model = "llama-3.3-70b-versatile"
            temperature = 0.2
            max_tokens = 2048

            [providers.groq]
            kind = "openai-compatible"
            base_url = "https://api.groq.com/openai/v1"
            priority = 7
            models = ["llama-3.3-70b-versatile"]

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.context.max_files, 20);
        assert_eq!(config.context.exclude, vec!["fixtures", "*.snap"]);
        assert!(config.context.use_summaries);
        assert_eq!(config.models.preferred_provider.as_deref(), Some("groq"));
        assert_eq!(config.models.max_tokens, Some(2048));
        let groq = &config.providers["groq"];
        assert_eq!(groq.kind, ProviderKind::OpenAiCompatible);
        assert_eq!(groq.priority, 7);
        // An explicit providers table replaces the defaults.
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_preferred_provider_gets_priority_zero() {
        let toml = r#"
            [models]
            preferred_provider = "openai"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.provider_priority("openai"), Some(0));
        assert_eq!(config.provider_priority("anthropic"), Some(5));
        assert_eq!(config.provider_priority("missing"), None);
    }

    #[test]
    fn test_validation_rejects_reserved_above_budget() {
        let toml = r#"
            [context]
            max_tokens = 2000
            reserved_tokens = 2000
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_max_files() {
        let toml = r#"
            [context]
            max_files = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());

        let mut config = AppConfig::default();
        config.context.max_files = MAX_FILES_LIMIT;
        assert!(config.validate().is_ok());
        config.context.max_files = MAX_FILES_LIMIT + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_tiny_budget() {
        let toml = r#"
            [context]
            max_tokens = 500
            reserved_tokens = 100
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_temperature() {
        let toml = r#"
            [models]
            temperature = 3.5
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_validation_requires_base_url_for_compatible() {
        let toml = r#"
            [providers.local]
            kind = "openai-compatible"
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("providers.local.base_url"));
    }

    #[test]
    fn test_validation_rejects_unknown_kind() {
        let toml = r#"
            [providers.x]
            kind = "carrier-pigeon"
        "#;
        assert!(matches!(AppConfig::parse(toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let toml = r#"
            [logging]
            level = "loud"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test_log::test]
    fn test_resolve_api_key_order() {
        let mut provider = ProviderConfig::new(ProviderKind::OpenAi);
        let env = |var: &str| match var {
            "SWITCHYARD_OPENAI_API_KEY" => Some("sy-key".to_string()),
            "OPENAI_API_KEY" => Some("plain-key".to_string()),
            _ => None,
        };
        assert_eq!(
            provider.resolve_api_key_with("openai", env).as_deref(),
            Some("sy-key")
        );

        provider.api_key = Some("inline-key".to_string());
        assert_eq!(
            provider.resolve_api_key_with("openai", env).as_deref(),
            Some("inline-key")
        );
    }

    #[test_log::test]
    fn test_resolve_api_key_falls_back_to_plain_var() {
        let provider = ProviderConfig::new(ProviderKind::OpenAiCompatible);
        let env = |var: &str| (var == "OPEN_ROUTER_API_KEY").then(|| "or-key".to_string());
        assert_eq!(
            provider.resolve_api_key_with("open-router", env).as_deref(),
            Some("or-key")
        );
    }

    #[test_log::test]
    fn test_resolve_api_key_ignores_empty_values() {
        let mut provider = ProviderConfig::new(ProviderKind::Anthropic);
        provider.api_key = Some("   ".to_string());
        let env = |_: &str| Some(String::new());
        assert_eq!(provider.resolve_api_key_with("anthropic", env), None);
    }

    #[test]
    fn test_provider_debug_redacts_key() {
        let mut provider = ProviderConfig::new(ProviderKind::Anthropic);
        provider.api_key = Some("sk-ant-secret".to_string());
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_serialized_config_omits_inline_key() {
        let mut config = AppConfig::default();
        if let Some(p) = config.providers.get_mut("openai") {
            p.api_key = Some("sk-secret".to_string());
        }
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
    }

    #[test_log::test(tokio::test)]
    async fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("switchyard.toml");
        tokio::fs::write(
            &path,
            r#"
            [context]
            max_files = 10
        "#,
        )
        .await
        .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.context.max_files, 10);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/switchyard.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_load_invalid_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        tokio::fs::write(&path, "this is not [valid toml")
            .await
            .unwrap();

        let result = AppConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
