//! Validators over produced content
//!
//! A validator answers "valid" or "invalid, and here is what must change".
//! The instruction text is carried through to observers and errors but is
//! not interpreted by the engine.

use crate::content::Content;
use crate::session::Session;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

/// Outcome of a validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid { instruction: String },
}

impl ValidationResult {
    pub fn invalid(instruction: impl Into<String>) -> Self {
        ValidationResult::Invalid {
            instruction: instruction.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn instruction(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { instruction } => Some(instruction),
        }
    }
}

#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, content: &Content, session: &Session) -> ValidationResult;
}

#[async_trait]
impl<T: Validator + ?Sized> Validator for Arc<T> {
    async fn validate(&self, content: &Content, session: &Session) -> ValidationResult {
        (**self).validate(content, session).await
    }
}

type CheckFn = Arc<dyn Fn(&Content, &Session) -> ValidationResult + Send + Sync>;

/// Validator from a plain function
#[derive(Clone)]
pub struct FnValidator {
    check: CheckFn,
}

impl FnValidator {
    pub fn new(
        check: impl Fn(&Content, &Session) -> ValidationResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            check: Arc::new(check),
        }
    }

    /// Validator from a text predicate with a fixed instruction
    pub fn predicate(
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        instruction: impl Into<String>,
    ) -> Self {
        let instruction = instruction.into();
        Self::new(move |content, _| {
            if predicate(&content.text) {
                ValidationResult::Valid
            } else {
                ValidationResult::invalid(instruction.clone())
            }
        })
    }
}

#[async_trait]
impl Validator for FnValidator {
    async fn validate(&self, content: &Content, session: &Session) -> ValidationResult {
        (self.check)(content, session)
    }
}

/// Requires the text to match a regular expression
#[derive(Debug, Clone)]
pub struct RegexValidator {
    pattern: Regex,
    instruction: Option<String>,
}

impl RegexValidator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            instruction: None,
        })
    }

    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }
}

#[async_trait]
impl Validator for RegexValidator {
    async fn validate(&self, content: &Content, _session: &Session) -> ValidationResult {
        if self.pattern.is_match(&content.text) {
            return ValidationResult::Valid;
        }
        ValidationResult::invalid(self.instruction.clone().unwrap_or_else(|| {
            format!("Response must match the pattern `{}`", self.pattern.as_str())
        }))
    }
}

/// Bounds the text length in characters
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthValidator {
    min: Option<usize>,
    max: Option<usize>,
}

impl LengthValidator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }
}

#[async_trait]
impl Validator for LengthValidator {
    async fn validate(&self, content: &Content, _session: &Session) -> ValidationResult {
        let len = content.text.chars().count();
        match (self.min, self.max) {
            (Some(min), _) if len < min => ValidationResult::invalid(format!(
                "Response is {len} characters; it must be at least {min}"
            )),
            (_, Some(max)) if len > max => ValidationResult::invalid(format!(
                "Response is {len} characters; it must be at most {max}"
            )),
            _ => ValidationResult::Valid,
        }
    }
}

/// Passes only when every inner validator passes
#[derive(Clone, Default)]
pub struct All {
    validators: Vec<Arc<dyn Validator>>,
}

impl All {
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        Self { validators }
    }

    #[must_use]
    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }
}

#[async_trait]
impl Validator for All {
    async fn validate(&self, content: &Content, session: &Session) -> ValidationResult {
        let mut failures = Vec::new();
        for validator in &self.validators {
            if let ValidationResult::Invalid { instruction } =
                validator.validate(content, session).await
            {
                failures.push(instruction);
            }
        }
        if failures.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::invalid(failures.join("\n"))
        }
    }
}

/// Passes when at least one inner validator passes.
///
/// An empty `Any` never passes.
#[derive(Clone, Default)]
pub struct Any {
    validators: Vec<Arc<dyn Validator>>,
}

impl Any {
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        Self { validators }
    }

    #[must_use]
    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }
}

#[async_trait]
impl Validator for Any {
    async fn validate(&self, content: &Content, session: &Session) -> ValidationResult {
        let mut failures = Vec::new();
        for validator in &self.validators {
            match validator.validate(content, session).await {
                ValidationResult::Valid => return ValidationResult::Valid,
                ValidationResult::Invalid { instruction } => failures.push(instruction),
            }
        }
        if failures.is_empty() {
            return ValidationResult::invalid("No validator accepted the response");
        }
        ValidationResult::invalid(failures.join("\n"))
    }
}
