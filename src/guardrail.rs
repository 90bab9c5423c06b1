//! Guardrail retry engine
//!
//! Wraps a content source with a validator and a bounded attempt budget:
//!
//! 1. produce content (attempt `n`)
//! 2. validate it against the session
//! 3. valid: accept
//! 4. invalid and `n < max_attempts`: try again
//! 5. invalid and `n == max_attempts`: raise, or accept the last content
//!    when the policy is [`FailurePolicy::Continue`]
//!
//! The source is never invoked more than `max_attempts` times. Generation
//! errors are not counted as attempts; they propagate unless the source
//! handles them itself.

use crate::content::{Content, ContentSource};
use crate::context::RunContext;
use crate::error::TemplateError;
use crate::session::Session;
use crate::validate::{ValidationResult, Validator};
use std::sync::Arc;

/// What to do once every attempt has failed validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail with [`TemplateError::ValidationExhausted`]
    #[default]
    Raise,
    /// Accept the last (invalid) content
    Continue,
}

type FailureObserver = Arc<dyn Fn(&ValidationResult, &Content, u32) + Send + Sync>;

/// Validator plus retry policy
#[derive(Clone)]
pub struct Guardrail {
    validator: Arc<dyn Validator>,
    max_attempts: Option<u32>,
    policy: FailurePolicy,
    on_failure: Option<FailureObserver>,
}

/// Content accepted by a guardrail run
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub content: Content,
    /// Number of source invocations it took
    pub attempts: u32,
    /// False when the content was accepted under `FailurePolicy::Continue`
    pub valid: bool,
}

impl Guardrail {
    pub fn new(validator: impl Validator + 'static) -> Self {
        Self::from_arc(Arc::new(validator))
    }

    pub fn from_arc(validator: Arc<dyn Validator>) -> Self {
        Self {
            validator,
            max_attempts: None,
            policy: FailurePolicy::default(),
            on_failure: None,
        }
    }

    /// Attempt budget; falls back to `EngineConfig::max_attempts` when unset
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand: `true` raises on exhaustion, `false` accepts the last content
    #[must_use]
    pub fn raise_error(self, raise: bool) -> Self {
        self.policy(if raise {
            FailurePolicy::Raise
        } else {
            FailurePolicy::Continue
        })
    }

    /// Called on every failed validation with the result, the rejected
    /// content and the 1-based attempt number
    #[must_use]
    pub fn on_failure(
        mut self,
        observer: impl Fn(&ValidationResult, &Content, u32) + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Some(Arc::new(observer));
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    fn attempt_budget(&self, ctx: &RunContext) -> u32 {
        self.max_attempts.unwrap_or(ctx.config().max_attempts).max(1)
    }

    /// Drive the attempt loop for `source` against `session`
    pub async fn run(
        &self,
        source: &dyn ContentSource,
        session: &Session,
        ctx: &RunContext,
    ) -> Result<Accepted, TemplateError> {
        let max_attempts = self.attempt_budget(ctx);
        let mut attempt = 1;

        loop {
            let content = source.get_content(session, ctx).await?;
            let result = self.validator.validate(&content, session).await;

            let instruction = match &result {
                ValidationResult::Valid => {
                    tracing::info!(attempt, max_attempts, "Guarded content accepted");
                    return Ok(Accepted {
                        content,
                        attempts: attempt,
                        valid: true,
                    });
                }
                ValidationResult::Invalid { instruction } => instruction.clone(),
            };

            if let Some(observer) = &self.on_failure {
                observer(&result, &content, attempt);
            }

            if attempt < max_attempts {
                tracing::debug!(attempt, max_attempts, %instruction, "Validation failed, retrying");
                attempt += 1;
                continue;
            }

            return match self.policy {
                FailurePolicy::Raise => Err(TemplateError::ValidationExhausted {
                    attempts: attempt,
                    instruction,
                }),
                FailurePolicy::Continue => {
                    tracing::warn!(
                        attempts = attempt,
                        %instruction,
                        "Validation attempts exhausted, accepting last content"
                    );
                    Ok(Accepted {
                        content,
                        attempts: attempt,
                        valid: false,
                    })
                }
            };
        }
    }
}
