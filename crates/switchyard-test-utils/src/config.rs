//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use switchyard_config::{AppConfig, ProviderConfig, ProviderKind};

/// Fluent builder for [`AppConfig`] in tests.
///
/// Starts with no providers, unlike [`AppConfig::default`].
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .provider("anthropic", ProviderKind::Anthropic, "test-key")
///     .preferred_provider("anthropic")
///     .max_tokens(8_000)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.providers.clear();
        Self { config }
    }

    pub fn max_files(mut self, n: usize) -> Self {
        self.config.context.max_files = n;
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.context.max_tokens = n;
        self
    }

    pub fn reserved_tokens(mut self, n: u32) -> Self {
        self.config.context.reserved_tokens = n;
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.context.exclude.push(pattern.to_string());
        self
    }

    pub fn use_summaries(mut self, enabled: bool) -> Self {
        self.config.context.use_summaries = enabled;
        self
    }

    pub fn preferred_provider(mut self, name: &str) -> Self {
        self.config.models.preferred_provider = Some(name.to_string());
        self
    }

    pub fn preferred_model(mut self, model: &str) -> Self {
        self.config.models.preferred_model = Some(model.to_string());
        self
    }

    /// Add a provider with an inline key.
    pub fn provider(mut self, name: &str, kind: ProviderKind, api_key: &str) -> Self {
        let mut entry = ProviderConfig::new(kind);
        entry.api_key = Some(api_key.to_string());
        self.config.providers.insert(name.to_string(), entry);
        self
    }

    /// Add a fully specified provider entry.
    pub fn provider_entry(mut self, name: &str, entry: ProviderConfig) -> Self {
        self.config.providers.insert(name.to_string(), entry);
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
