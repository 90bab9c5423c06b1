//! Provider registry for the generation collaborator

use super::{GenerationOptions, LlmError, LlmService, LoggingService};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available generation providers
#[derive(Clone, Default)]
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_provider: Option<String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its `provider_id`, wrapped with logging
    #[must_use]
    pub fn with_service(mut self, service: Arc<dyn LlmService>) -> Self {
        self.register(service);
        self
    }

    pub fn register(&mut self, service: Arc<dyn LlmService>) {
        let id = service.provider_id().to_string();
        let wrapped: Arc<dyn LlmService> = Arc::new(LoggingService::new(service));
        if self.services.insert(id.clone(), wrapped).is_some() {
            tracing::warn!(provider = %id, "Replacing registered LLM provider");
        }
    }

    #[must_use]
    pub fn with_default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = Some(provider.into());
        self
    }

    pub fn set_default_provider(&mut self, provider: impl Into<String>) {
        self.default_provider = Some(provider.into());
    }

    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    pub fn has_providers(&self) -> bool {
        !self.services.is_empty()
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(provider).cloned()
    }

    /// List all registered provider ids
    pub fn available_providers(&self) -> Vec<String> {
        let mut providers: Vec<_> = self.services.keys().cloned().collect();
        providers.sort();
        providers
    }

    /// Pick the service for a request.
    ///
    /// Order: the options' provider, the default provider, the sole
    /// registered provider.
    pub fn resolve(&self, options: &GenerationOptions) -> Result<Arc<dyn LlmService>, LlmError> {
        if let Some(provider) = &options.provider {
            return self
                .get(provider)
                .ok_or_else(|| LlmError::invalid_request(format!("unknown provider '{provider}'")));
        }

        if let Some(provider) = &self.default_provider {
            return self.get(provider).ok_or_else(|| {
                LlmError::invalid_request(format!(
                    "default provider '{provider}' is not registered"
                ))
            });
        }

        let mut services = self.services.values();
        match (services.next(), services.next()) {
            (Some(only), None) => Ok(Arc::clone(only)),
            (None, _) => Err(LlmError::invalid_request("no LLM provider registered")),
            (Some(_), Some(_)) => Err(LlmError::invalid_request(
                "several LLM providers registered and none selected",
            )),
        }
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("providers", &self.available_providers())
            .field("default_provider", &self.default_provider)
            .finish()
    }
}
