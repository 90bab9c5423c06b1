//! Generation collaborator
//!
//! The engine never talks to a provider directly. Anything that can turn a
//! session plus `GenerationOptions` into an assistant message implements
//! [`LlmService`] and is registered in a [`ModelRegistry`].

mod error;
mod registry;
mod stream;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use registry::ModelRegistry;
pub use stream::{MessageDelta, MessageStream};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for generation providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Produce one complete assistant response
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Produce the response as a stream of deltas.
    ///
    /// Providers without native streaming get a single-chunk stream.
    async fn stream(&self, request: &LlmRequest) -> MessageStream {
        match self.complete(request).await {
            Ok(response) => MessageStream::from_response(response),
            Err(e) => MessageStream::from_error(e),
        }
    }

    /// Provider identifier used for registry lookup and logging
    fn provider_id(&self) -> &str;
}

#[async_trait]
impl<T: LlmService + ?Sized> LlmService for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    async fn stream(&self, request: &LlmRequest) -> MessageStream {
        (**self).stream(request).await
    }

    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }
}

/// Logging wrapper for generation services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    provider_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let provider_id = inner.provider_id().to_string();
        Self { inner, provider_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    provider = %self.provider_id,
                    model = ?request.options.model,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    tool_calls = response.tool_calls().len(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.provider_id,
                    model = ?request.options.model,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.is_retryable(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    async fn stream(&self, request: &LlmRequest) -> MessageStream {
        tracing::debug!(
            provider = %self.provider_id,
            model = ?request.options.model,
            "LLM stream opened"
        );
        self.inner.stream(request).await
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }
}
