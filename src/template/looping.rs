use super::{Predicate, Template};
use crate::context::RunContext;
use crate::error::{TemplateError, TemplateResult};
use crate::session::Session;
use std::sync::Arc;

/// How a loop decides whether to run another pass
#[derive(Clone)]
pub enum LoopCondition {
    /// Checked before every pass; the loop runs while it holds. The body may
    /// run zero times.
    While(Predicate),
    /// Checked after every pass; the loop stops once it holds. The body runs
    /// at least once.
    Until(Predicate),
}

/// Repeats a body template under a condition and an iteration cap.
///
/// Hitting the cap is not an error: a warning is logged and the session
/// reached so far is returned.
#[derive(Clone)]
pub struct Loop {
    body: Option<Arc<Template>>,
    condition: Option<LoopCondition>,
    max_iterations: Option<u32>,
}

impl Loop {
    pub fn builder() -> LoopBuilder {
        LoopBuilder::default()
    }

    pub(super) async fn execute(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> TemplateResult<Session> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| TemplateError::configuration("loop has no body template"))?;

        let Some(condition) = &self.condition else {
            tracing::warn!("Loop has no condition, running the body once");
            return body.execute(session, ctx).await;
        };

        let max_iterations = self.max_iterations.unwrap_or(ctx.config().max_iterations);
        let mut current = session.clone();
        let mut iterations = 0;

        loop {
            let proceed = match condition {
                LoopCondition::While(predicate) => predicate(&current),
                LoopCondition::Until(predicate) => iterations == 0 || !predicate(&current),
            };
            if !proceed {
                tracing::debug!(iterations, "Loop condition ended the loop");
                return Ok(current);
            }
            if iterations >= max_iterations {
                tracing::warn!(max_iterations, "Loop reached its iteration cap");
                return Ok(current);
            }
            current = body.execute(&current, ctx).await?;
            iterations += 1;
        }
    }
}

impl From<Loop> for Template {
    fn from(looping: Loop) -> Self {
        Template::Loop(looping)
    }
}

#[derive(Default)]
pub struct LoopBuilder {
    body: Option<Template>,
    condition: Option<LoopCondition>,
    max_iterations: Option<u32>,
}

impl LoopBuilder {
    #[must_use]
    pub fn body(mut self, body: Template) -> Self {
        self.body = Some(body);
        self
    }

    /// Continuation predicate, same as [`LoopBuilder::loop_while`]
    #[must_use]
    pub fn condition(self, predicate: impl Fn(&Session) -> bool + Send + Sync + 'static) -> Self {
        self.loop_while(predicate)
    }

    #[must_use]
    pub fn loop_while(
        mut self,
        predicate: impl Fn(&Session) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(LoopCondition::While(Arc::new(predicate)));
        self
    }

    /// Exit condition checked after each pass
    #[must_use]
    pub fn exit_when(
        mut self,
        predicate: impl Fn(&Session) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(LoopCondition::Until(Arc::new(predicate)));
        self
    }

    /// Iteration cap; falls back to `EngineConfig::max_iterations` when unset
    #[must_use]
    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn build(self) -> Template {
        Template::Loop(Loop {
            body: self.body.map(Arc::new),
            condition: self.condition,
            max_iterations: self.max_iterations,
        })
    }
}
