//! Engine error types

use crate::llm::LlmError;
use thiserror::Error;

/// Boxed error returned by caller-supplied callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by template execution
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Missing or inconsistent wiring. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Guardrail attempts exhausted with a raising failure policy
    #[error("validation failed after {attempts} attempt(s): {instruction}")]
    ValidationExhausted { attempts: u32, instruction: String },
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),
    #[error("callback failed: {0}")]
    Callback(#[source] BoxError),
    #[error("user input failed: {0}")]
    Input(String),
    #[error("interpolation failed: {0}")]
    Interpolation(String),
    #[error("tool execution failed: {0}")]
    Tool(String),
}

impl TemplateError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(e: minijinja::Error) -> Self {
        Self::Interpolation(e.to_string())
    }
}

pub type TemplateResult<T> = Result<T, TemplateError>;
