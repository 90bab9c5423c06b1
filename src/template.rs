//! Conversation templates
//!
//! A template turns a session into a new session. Primitives emit a single
//! turn; composites combine child templates and drive control flow. Trees
//! are assembled with builders and are immutable once built, so one tree can
//! run many times, concurrently, against different sessions.

mod conditional;
mod looping;
mod parallel;
mod primitive;
mod schema;
mod sequence;
mod subroutine;

#[cfg(test)]
mod proptests;

pub use conditional::Conditional;
pub use looping::{Loop, LoopBuilder, LoopCondition};
pub use parallel::{Aggregation, Parallel, ParallelBuilder};
pub use primitive::{
    AssistantBuilder, AssistantTemplate, Primitive, SystemTemplate, ToolResultsTemplate,
    UserBuilder, UserTemplate,
};
pub use schema::{SchemaBuilder, SchemaTemplate};
pub use sequence::{Sequence, SequenceBuilder};
pub use subroutine::{init, squash, Subroutine, SubroutineBuilder};

use crate::context::RunContext;
use crate::error::TemplateResult;
use crate::session::{Role, Session};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;

/// Boolean test over a session
pub type Predicate = Arc<dyn Fn(&Session) -> bool + Send + Sync>;

/// A node of the template tree
#[derive(Clone)]
pub enum Template {
    Primitive(Primitive),
    Sequence(Sequence),
    Loop(Loop),
    Conditional(Conditional),
    Subroutine(Subroutine),
    Parallel(Parallel),
}

impl Template {
    /// Run this template against `session`, returning the resulting session.
    ///
    /// `session` itself is never modified.
    pub fn execute<'a>(
        &'a self,
        session: &'a Session,
        ctx: &'a RunContext,
    ) -> BoxFuture<'a, TemplateResult<Session>> {
        async move {
            match self {
                Template::Primitive(primitive) => primitive.execute(session, ctx).await,
                Template::Sequence(sequence) => sequence.execute(session, ctx).await,
                Template::Loop(looping) => looping.execute(session, ctx).await,
                Template::Conditional(conditional) => conditional.execute(session, ctx).await,
                Template::Subroutine(subroutine) => subroutine.execute(session, ctx).await,
                Template::Parallel(parallel) => parallel.execute(session, ctx).await,
            }
        }
        .boxed()
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Template::Primitive(primitive) => primitive.kind(),
            Template::Sequence(_) => "sequence",
            Template::Loop(_) => "loop",
            Template::Conditional(_) => "conditional",
            Template::Subroutine(_) => "subroutine",
            Template::Parallel(_) => "parallel",
        }
    }

    /// System message with `{{ attribute }}` interpolation
    pub fn system(text: impl Into<String>) -> Self {
        Template::Primitive(Primitive::System(SystemTemplate::new(text)))
    }

    /// User turn from the context's input collaborator (or the default text)
    pub fn user() -> Self {
        UserTemplate::builder().build()
    }

    /// User turn with fixed text
    pub fn user_text(text: impl Into<String>) -> Self {
        UserTemplate::builder().content(text).build()
    }

    /// Assistant turn with fixed text
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Template::Primitive(Primitive::Assistant(AssistantTemplate::from_text(text)))
    }

    /// Answers the pending tool calls of the latest assistant turn
    pub fn tool_results() -> Self {
        Template::Primitive(Primitive::ToolResults(ToolResultsTemplate))
    }

    pub fn sequence(children: impl IntoIterator<Item = Template>) -> Self {
        Template::Sequence(Sequence::new(children.into_iter().collect()))
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Template::Primitive(p) => write!(f, "Template::{}", p.kind()),
            Template::Sequence(s) => f.debug_tuple("Template::Sequence").field(&s.len()).finish(),
            other => write!(f, "Template::{}", other.kind()),
        }
    }
}

/// True once the latest assistant message contains `needle`
pub fn last_assistant_contains(
    needle: impl Into<String>,
) -> impl Fn(&Session) -> bool + Send + Sync + 'static {
    let needle = needle.into();
    move |session| {
        session
            .last_of(Role::Assistant)
            .is_some_and(|m| m.content().contains(needle.as_str()))
    }
}

/// True when attribute `key` equals `value`
pub fn attribute_equals(
    key: impl Into<String>,
    value: Value,
) -> impl Fn(&Session) -> bool + Send + Sync + 'static {
    let key = key.into();
    move |session| session.attribute(&key) == Some(&value)
}

/// Negate a predicate
pub fn not(
    predicate: impl Fn(&Session) -> bool + Send + Sync + 'static,
) -> impl Fn(&Session) -> bool + Send + Sync + 'static {
    move |session| !predicate(session)
}
