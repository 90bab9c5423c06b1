//! Primitive templates: one turn each

use super::schema::SchemaTemplate;
use super::Template;
use crate::content::{Content, ContentSource, GenerativeSource, StaticSource, UserInputSource};
use crate::context::RunContext;
use crate::error::{TemplateError, TemplateResult};
use crate::guardrail::Guardrail;
use crate::interpolate;
use crate::llm::GenerationOptions;
use crate::session::{Attributes, Message, Role, Session, ToolCall};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// Atomic steps
#[derive(Clone)]
pub enum Primitive {
    System(SystemTemplate),
    User(UserTemplate),
    Assistant(AssistantTemplate),
    Schema(SchemaTemplate),
    ToolResults(ToolResultsTemplate),
}

impl Primitive {
    pub(super) async fn execute(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> TemplateResult<Session> {
        match self {
            Primitive::System(system) => system.execute(session),
            Primitive::User(user) => user.execute(session, ctx).await,
            Primitive::Assistant(assistant) => assistant.execute(session, ctx).await,
            Primitive::Schema(schema) => schema.execute(session, ctx).await,
            Primitive::ToolResults(tools) => tools.execute(session, ctx).await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::System(_) => "system",
            Primitive::User(_) => "user",
            Primitive::Assistant(_) => "assistant",
            Primitive::Schema(_) => "schema",
            Primitive::ToolResults(_) => "tool_results",
        }
    }
}

// ============================================================================
// System
// ============================================================================

/// Appends a system message rendered against the session attributes
#[derive(Debug, Clone)]
pub struct SystemTemplate {
    text: String,
}

impl SystemTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    fn execute(&self, session: &Session) -> TemplateResult<Session> {
        let content = interpolate::render(&self.text, session.attributes())?;
        Ok(session.add_message(Message::system(content)))
    }
}

// ============================================================================
// User
// ============================================================================

type InputCheck = Arc<dyn Fn(&str, &Session) -> bool + Send + Sync>;

/// Appends a user message from a content source.
///
/// With an input check configured, input is requested again until the check
/// passes. There is no attempt cap here: a check that never passes keeps
/// asking forever.
#[derive(Clone)]
pub struct UserTemplate {
    source: Arc<dyn ContentSource>,
    check: Option<InputCheck>,
}

impl UserTemplate {
    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }

    async fn execute(&self, session: &Session, ctx: &RunContext) -> TemplateResult<Session> {
        let mut rejected = 0u32;
        loop {
            let content = self.source.get_content(session, ctx).await?;
            match &self.check {
                Some(check) if !check(&content.text, session) => {
                    rejected += 1;
                    tracing::debug!(rejected, "User input rejected, asking again");
                }
                _ => return Ok(session.add_message(content.to_user_message())),
            }
        }
    }
}

/// Builder for [`UserTemplate`]
#[derive(Default)]
pub struct UserBuilder {
    source: Option<Arc<dyn ContentSource>>,
    prompt: Option<String>,
    default: Option<String>,
    check: Option<InputCheck>,
}

impl UserBuilder {
    /// Fixed user text
    #[must_use]
    pub fn content(mut self, text: impl Into<String>) -> Self {
        self.source = Some(Arc::new(StaticSource::new(text.into())));
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl ContentSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Prompt shown by interactive input collaborators
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Text used when no input is given
    #[must_use]
    pub fn default_text(mut self, text: impl Into<String>) -> Self {
        self.default = Some(text.into());
        self
    }

    /// Re-request input until `check` accepts it
    #[must_use]
    pub fn validate(
        mut self,
        check: impl Fn(&str, &Session) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.check = Some(Arc::new(check));
        self
    }

    pub fn build(self) -> Template {
        let source = self.source.unwrap_or_else(|| {
            let mut source = UserInputSource::new();
            if let Some(prompt) = self.prompt {
                source = source.prompt(prompt);
            }
            if let Some(default) = self.default {
                source = source.default_text(default);
            }
            Arc::new(source)
        });
        Template::Primitive(Primitive::User(UserTemplate {
            source,
            check: self.check,
        }))
    }
}

// ============================================================================
// Assistant
// ============================================================================

/// Static content rendered against the session attributes on every call,
/// so validators see the same text that gets appended
struct RenderedSource {
    content: Content,
}

#[async_trait]
impl ContentSource for RenderedSource {
    async fn get_content(&self, session: &Session, _ctx: &RunContext) -> TemplateResult<Content> {
        let mut content = self.content.clone();
        content.text = interpolate::render(&content.text, session.attributes())?;
        Ok(content)
    }
}

/// Appends an assistant message, optionally behind a guardrail.
///
/// Static text is rendered against the session attributes like system text.
#[derive(Clone)]
pub struct AssistantTemplate {
    source: Arc<dyn ContentSource>,
    guardrail: Option<Guardrail>,
}

impl AssistantTemplate {
    pub fn builder() -> AssistantBuilder {
        AssistantBuilder::default()
    }

    pub(super) fn from_text(text: impl Into<String>) -> Self {
        Self {
            source: Arc::new(RenderedSource {
                content: Content::text(text),
            }),
            guardrail: None,
        }
    }

    async fn execute(&self, session: &Session, ctx: &RunContext) -> TemplateResult<Session> {
        let content = match &self.guardrail {
            Some(guardrail) => guardrail.run(self.source.as_ref(), session, ctx).await?.content,
            None => self.source.get_content(session, ctx).await?,
        };
        Ok(session.add_message(content.to_assistant_message()))
    }
}

/// Builder for [`AssistantTemplate`].
///
/// Exactly one of static content, an explicit source, or generation options
/// must be configured; `build` fails otherwise.
#[derive(Default)]
pub struct AssistantBuilder {
    content: Option<String>,
    tool_calls: Vec<ToolCall>,
    source: Option<Arc<dyn ContentSource>>,
    options: Option<GenerationOptions>,
    guardrail: Option<Guardrail>,
}

impl AssistantBuilder {
    #[must_use]
    pub fn content(mut self, text: impl Into<String>) -> Self {
        self.content = Some(text.into());
        self
    }

    /// Tool calls carried by static content
    #[must_use]
    pub fn tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl ContentSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn source_arc(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn generate(mut self, options: GenerationOptions) -> Self {
        self.options = Some(options);
        self
    }

    #[must_use]
    pub fn guardrail(mut self, guardrail: Guardrail) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    pub fn build(self) -> TemplateResult<Template> {
        let configured = [
            self.content.is_some() || !self.tool_calls.is_empty(),
            self.source.is_some(),
            self.options.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();

        let choice = (configured, self.content, self.source, self.options);
        let source: Arc<dyn ContentSource> = match choice {
            (0, ..) => {
                return Err(TemplateError::configuration(
                    "assistant template needs content, a content source, or generation options",
                ))
            }
            (1, content, None, None) => Arc::new(RenderedSource {
                content: Content::text(content.unwrap_or_default())
                    .with_tool_calls(self.tool_calls),
            }),
            (1, None, Some(source), None) => source,
            (1, None, None, Some(options)) => Arc::new(GenerativeSource::new(options)),
            _ => {
                return Err(TemplateError::configuration(
                    "assistant template takes only one of content, source, or generation options",
                ))
            }
        };

        Ok(Template::Primitive(Primitive::Assistant(AssistantTemplate {
            source,
            guardrail: self.guardrail,
        })))
    }
}

// ============================================================================
// Tool results
// ============================================================================

/// Executes the pending tool calls of the latest assistant message and
/// appends one `tool_result` message per call, in call order
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolResultsTemplate;

impl ToolResultsTemplate {
    fn pending_calls(session: &Session) -> Vec<ToolCall> {
        let messages = session.messages();
        let Some(idx) = messages.iter().rposition(|m| m.role() == Role::Assistant) else {
            return Vec::new();
        };
        let answered: HashSet<&str> = messages
            .iter()
            .skip(idx + 1)
            .filter_map(Message::tool_call_id)
            .collect();
        messages[idx]
            .tool_calls()
            .iter()
            .filter(|call| !answered.contains(call.id.as_str()))
            .cloned()
            .collect()
    }

    fn error_result(id: &str, text: String) -> Message {
        let mut attrs = Attributes::new();
        attrs.insert("is_error".into(), json!(true));
        Message::tool_result(id, text).with_attributes(attrs)
    }

    async fn execute(&self, session: &Session, ctx: &RunContext) -> TemplateResult<Session> {
        let pending = Self::pending_calls(session);
        if pending.is_empty() {
            return Ok(session.clone());
        }
        let tools = ctx
            .tools()
            .ok_or_else(|| {
                TemplateError::configuration("tool calls pending but no tool executor configured")
            })?;

        let mut current = session.clone();
        for call in pending {
            let message = match tools.execute(&call).await {
                Some(output) if output.success => Message::tool_result(&call.id, output.output),
                Some(output) => {
                    tracing::warn!(tool = %call.name, id = %call.id, "Tool reported failure");
                    Self::error_result(&call.id, output.output)
                }
                None => {
                    tracing::warn!(tool = %call.name, id = %call.id, "Unknown tool requested");
                    Self::error_result(&call.id, format!("Unknown tool: {}", call.name))
                }
            };
            current = current.add_message(message);
        }
        Ok(current)
    }
}
