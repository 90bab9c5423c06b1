//! chatflow: composable conversation templates
//!
//! Conversation flows are trees of [`Template`]s executed against an
//! immutable [`Session`]. Primitive templates emit one system, user,
//! assistant or tool-result turn; composites ([`Sequence`], [`Loop`],
//! [`Conditional`], [`Subroutine`], [`Parallel`]) drive control flow.
//! Generated turns can sit behind a [`Guardrail`] that validates content and
//! retries within a bounded attempt budget.
//!
//! ```no_run
//! use chatflow::{
//!     AssistantTemplate, EngineConfig, GenerationOptions, ModelRegistry, RunContext, Session,
//!     Template,
//! };
//!
//! # async fn demo(registry: ModelRegistry) -> Result<(), chatflow::TemplateError> {
//! let flow = Template::sequence([
//!     Template::system("You are terse."),
//!     Template::user_text("Name a prime."),
//!     AssistantTemplate::builder()
//!         .generate(GenerationOptions::new().temperature(0.2))
//!         .build()?,
//! ]);
//! let ctx = RunContext::new(EngineConfig::from_env()).with_models(registry);
//! let session = flow.execute(&Session::new(), &ctx).await?;
//! println!("{}", session.last_message().map(|m| m.content()).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod guardrail;
pub mod input;
pub mod interpolate;
pub mod llm;
pub mod logging;
pub mod schema;
pub mod session;
pub mod template;
pub mod tools;
pub mod validate;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use content::{
    CallbackSource, Content, ContentSource, GenerativeSource, RetryPolicy, StaticSource,
    UserInputSource,
};
pub use context::RunContext;
pub use error::{BoxError, TemplateError, TemplateResult};
pub use guardrail::{Accepted, FailurePolicy, Guardrail};
pub use input::{InputContext, ScriptedInput, TerminalInput, UserInput};
pub use llm::{GenerationOptions, LlmError, LlmService, MessageStream, ModelRegistry};
pub use schema::{JsonSchemaValidator, ObjectSchema, PropertyType, STRUCTURED_OUTPUT_KEY};
pub use session::{Attributes, Message, Role, Session, ToolCall};
pub use template::{
    AssistantTemplate, Conditional, Loop, Parallel, SchemaTemplate, Sequence, Subroutine, Template,
    UserTemplate,
};
pub use tools::{FnToolExecutor, ToolExecutor, ToolOutput};
pub use validate::{ValidationResult, Validator};
