//! Content sources
//!
//! A content source yields the text (and optional tool calls/attributes) for
//! one turn. Variants: a fixed value, a caller callback, delegated
//! generation, and the user-input collaborator.

use crate::context::RunContext;
use crate::error::{BoxError, TemplateError};
use crate::input::InputContext;
use crate::input::UserInput;
use crate::llm::{GenerationOptions, LlmError, LlmRequest, LlmResponse, MessageDelta};
use crate::session::{Attributes, Message, Session, ToolCall};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Content produced for a turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub attributes: Attributes,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn to_assistant_message(&self) -> Message {
        Message::assistant_with_tools(self.text.clone(), self.tool_calls.clone())
            .with_attributes(self.attributes.clone())
    }

    pub fn to_user_message(&self) -> Message {
        Message::user(self.text.clone()).with_attributes(self.attributes.clone())
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::text(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::text(text)
    }
}

impl From<LlmResponse> for Content {
    fn from(response: LlmResponse) -> Self {
        Content {
            text: response.joined_text(),
            tool_calls: response.tool_calls(),
            attributes: Attributes::new(),
        }
    }
}

/// Capability producing content for a turn
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn get_content(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> Result<Content, TemplateError>;
}

#[async_trait]
impl<T: ContentSource + ?Sized> ContentSource for Arc<T> {
    async fn get_content(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> Result<Content, TemplateError> {
        (**self).get_content(session, ctx).await
    }
}

/// Fixed content; ignores the session
#[derive(Debug, Clone)]
pub struct StaticSource {
    content: Content,
}

impl StaticSource {
    pub fn new(content: impl Into<Content>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    async fn get_content(
        &self,
        _session: &Session,
        _ctx: &RunContext,
    ) -> Result<Content, TemplateError> {
        Ok(self.content.clone())
    }
}

type ContentFn =
    Arc<dyn Fn(Session) -> BoxFuture<'static, Result<Content, BoxError>> + Send + Sync>;

/// Caller-supplied function of the session. Failures propagate.
#[derive(Clone)]
pub struct CallbackSource {
    f: ContentFn,
}

impl CallbackSource {
    pub fn new<F, Fut, C>(f: F) -> Self
    where
        F: Fn(Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, BoxError>> + Send + 'static,
        C: Into<Content>,
    {
        let f: ContentFn = Arc::new(move |session| {
            let fut = f(session);
            Box::pin(async move { fut.await.map(Into::into) })
        });
        Self { f }
    }

    /// Synchronous, infallible callback
    pub fn from_fn<F, C>(f: F) -> Self
    where
        F: Fn(&Session) -> C + Send + Sync + 'static,
        C: Into<Content>,
    {
        let f: ContentFn = Arc::new(move |session| {
            let content = f(&session).into();
            Box::pin(async move { Ok(content) })
        });
        Self { f }
    }
}

#[async_trait]
impl ContentSource for CallbackSource {
    async fn get_content(
        &self,
        session: &Session,
        _ctx: &RunContext,
    ) -> Result<Content, TemplateError> {
        (self.f)(session.clone()).await.map_err(TemplateError::Callback)
    }
}

/// Bounded retry for retryable generation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `retry` (0-based), honouring `retry_after`
    pub fn delay_for(&self, retry: u32, error: &LlmError) -> Duration {
        error
            .retry_after
            .unwrap_or_else(|| self.base_delay.saturating_mul(2u32.saturating_pow(retry)))
    }
}

type DeltaObserver = Arc<dyn Fn(&MessageDelta) + Send + Sync>;

/// Delegates to the generation collaborator
#[derive(Clone)]
pub struct GenerativeSource {
    options: GenerationOptions,
    retry: RetryPolicy,
    streaming: Option<DeltaObserver>,
}

impl GenerativeSource {
    pub fn new(options: GenerationOptions) -> Self {
        Self {
            options,
            retry: RetryPolicy::default(),
            streaming: None,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generate through the streaming interface, reporting each delta
    #[must_use]
    pub fn streaming(mut self, on_delta: impl Fn(&MessageDelta) + Send + Sync + 'static) -> Self {
        self.streaming = Some(Arc::new(on_delta));
        self
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    async fn generate_once(
        &self,
        ctx: &RunContext,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let service = ctx.models().resolve(&self.options)?;
        match &self.streaming {
            Some(observer) => {
                let stream = service.stream(request).await;
                stream.collect_with(|delta| observer(delta)).await
            }
            None => service.complete(request).await,
        }
    }
}

#[async_trait]
impl ContentSource for GenerativeSource {
    async fn get_content(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> Result<Content, TemplateError> {
        let request = LlmRequest::from_session(session, &self.options);
        let mut retry = 0;
        loop {
            match self.generate_once(ctx, &request).await {
                Ok(response) => return Ok(response.into()),
                Err(e) if e.is_retryable() && retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retry, &e);
                    tracing::warn!(
                        error = %e,
                        retry = retry + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = %delay.as_millis(),
                        "Retrying generation"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// User turn text from the input collaborator.
///
/// Uses its own collaborator when given one, otherwise the context's; with
/// neither it yields the configured default text.
#[derive(Clone, Default)]
pub struct UserInputSource {
    input: Option<Arc<dyn UserInput>>,
    prompt: Option<String>,
    default: Option<String>,
}

impl UserInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_input(mut self, input: Arc<dyn UserInput>) -> Self {
        self.input = Some(input);
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn default_text(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[async_trait]
impl ContentSource for UserInputSource {
    async fn get_content(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> Result<Content, TemplateError> {
        let default = self
            .default
            .as_deref()
            .unwrap_or(ctx.config().user_default.as_str());
        let Some(input) = self.input.as_ref().or_else(|| ctx.user_input()) else {
            return Ok(Content::text(default));
        };

        let input_ctx = InputContext {
            attributes: session.attributes(),
            prompt: self.prompt.as_deref(),
            default: (!default.is_empty()).then_some(default),
        };
        input.get_input(&input_ctx).await.map(Content::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptedInput;
    use crate::llm::ModelRegistry;
    use crate::testing::MockLlmService;
    use serde_json::json;

    fn ctx_with(mock: &Arc<MockLlmService>) -> RunContext {
        RunContext::default().with_models(ModelRegistry::new().with_service(mock.clone()))
    }

    #[tokio::test]
    async fn static_source_ignores_session() {
        let source = StaticSource::new("fixed");
        let session = Session::new().add_message(Message::user("x"));
        let content = source.get_content(&session, &RunContext::default()).await.unwrap();
        assert_eq!(content.text, "fixed");
    }

    #[tokio::test]
    async fn callback_sees_session_and_propagates_failure() {
        let source = CallbackSource::from_fn(|s: &Session| format!("{} messages", s.len()));
        let session = Session::new().add_message(Message::user("x"));
        let content = source.get_content(&session, &RunContext::default()).await.unwrap();
        assert_eq!(content.text, "1 messages");

        let failing = CallbackSource::new(|_s| async { Err::<String, BoxError>("boom".into()) });
        let err = failing
            .get_content(&session, &RunContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::Callback(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn generative_passes_session_and_options() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_response(LlmResponse::text("generated"));
        let source = GenerativeSource::new(GenerationOptions::new().temperature(0.5));

        let session = Session::new()
            .add_message(Message::system("sys"))
            .add_message(Message::user("q"));
        let content = source.get_content(&session, &ctx_with(&mock)).await.unwrap();

        assert_eq!(content.text, "generated");
        let requests = mock.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, vec!["sys".to_string()]);
        assert_eq!(requests[0].options.temperature, Some(0.5));
    }

    #[tokio::test]
    async fn generative_retries_retryable_errors() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_error(LlmError::network("reset"));
        mock.queue_error(LlmError::rate_limit("429").with_retry_after(Duration::from_millis(1)));
        mock.queue_response(LlmResponse::text("ok"));
        let source = GenerativeSource::new(GenerationOptions::new())
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)));

        let content = source.get_content(&Session::new(), &ctx_with(&mock)).await.unwrap();
        assert_eq!(content.text, "ok");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn generative_does_not_retry_auth_errors() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_error(LlmError::auth("bad key"));
        let source = GenerativeSource::new(GenerationOptions::new())
            .with_retry(RetryPolicy::new(5, Duration::from_millis(1)));

        let err = source
            .get_content(&Session::new(), &ctx_with(&mock))
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::Generation(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn streaming_reports_deltas() {
        let mock = Arc::new(MockLlmService::new("mock"));
        mock.queue_response(LlmResponse {
            content: vec![
                crate::llm::ContentBlock::text("hi"),
                crate::llm::ContentBlock::tool_use("t1", "lookup", json!({ "q": 1 })),
            ],
            ..LlmResponse::default()
        });
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let source = GenerativeSource::new(GenerationOptions::new())
            .streaming(move |delta| sink.lock().unwrap().push(delta.text.clone()));

        let content = source.get_content(&Session::new(), &ctx_with(&mock)).await.unwrap();
        assert_eq!(content.text, "hi");
        assert_eq!(content.tool_calls.len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn user_source_prefers_own_input_then_context_then_default() {
        let session = Session::new();
        let own = UserInputSource::new().with_input(Arc::new(ScriptedInput::new(["mine"])));
        let ctx = RunContext::default().with_user_input(Arc::new(ScriptedInput::new(["ctx"])));

        assert_eq!(own.get_content(&session, &ctx).await.unwrap().text, "mine");
        assert_eq!(UserInputSource::new().get_content(&session, &ctx).await.unwrap().text, "ctx");

        let bare = UserInputSource::new().default_text("fallback");
        let content = bare.get_content(&session, &RunContext::default()).await.unwrap();
        assert_eq!(content.text, "fallback");
        let empty = UserInputSource::new();
        assert_eq!(empty.get_content(&session, &RunContext::default()).await.unwrap().text, "");
    }
}
