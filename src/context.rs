//! Execution context injected at the top of every `execute` call
//!
//! Collaborators and defaults travel explicitly with the call instead of
//! being stored on (or discovered from) template nodes.

use crate::config::EngineConfig;
use crate::input::UserInput;
use crate::llm::ModelRegistry;
use crate::tools::ToolExecutor;
use std::sync::Arc;

/// Collaborators and defaults available to a template run
#[derive(Clone, Default)]
pub struct RunContext {
    config: EngineConfig,
    models: Arc<ModelRegistry>,
    user_input: Option<Arc<dyn UserInput>>,
    tools: Option<Arc<dyn ToolExecutor>>,
}

impl RunContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Install the provider registry. A configured default provider is
    /// applied unless the registry already names one.
    #[must_use]
    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        let models = match &self.config.default_provider {
            Some(provider)
                if models.default_provider().is_none() && models.get(provider).is_some() =>
            {
                models.with_default_provider(provider.clone())
            }
            _ => models,
        };
        self.models = Arc::new(models);
        self
    }

    #[must_use]
    pub fn with_user_input(mut self, input: Arc<dyn UserInput>) -> Self {
        self.user_input = Some(input);
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn user_input(&self) -> Option<&Arc<dyn UserInput>> {
        self.user_input.as_ref()
    }

    pub fn tools(&self) -> Option<&Arc<dyn ToolExecutor>> {
        self.tools.as_ref()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("config", &self.config)
            .field("models", &self.models)
            .field("user_input", &self.user_input.is_some())
            .field("tools", &self.tools.is_some())
            .finish()
    }
}
