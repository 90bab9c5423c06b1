//! Structured-output assistant turn

use super::primitive::Primitive;
use super::Template;
use crate::content::{Content, ContentSource, GenerativeSource};
use crate::context::RunContext;
use crate::error::{TemplateError, TemplateResult};
use crate::guardrail::{FailurePolicy, Guardrail};
use crate::llm::GenerationOptions;
use crate::schema::{JsonSchemaValidator, ObjectSchema, STRUCTURED_OUTPUT_KEY};
use crate::session::Session;
use crate::validate::{All, ValidationResult, Validator};
use std::sync::Arc;

type FailureObserver = Arc<dyn Fn(&ValidationResult, &Content, u32) + Send + Sync>;

/// Assistant turn whose content must carry a JSON object matching a schema.
///
/// The accepted object is stored under [`STRUCTURED_OUTPUT_KEY`]. Content
/// accepted without passing validation (non-raising policy) is appended but
/// leaves the attribute untouched.
#[derive(Clone)]
pub struct SchemaTemplate {
    source: Arc<dyn ContentSource>,
    schema: JsonSchemaValidator,
    guardrail: Guardrail,
}

impl std::fmt::Debug for SchemaTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaTemplate")
            .field("schema", self.schema.schema())
            .finish_non_exhaustive()
    }
}

impl SchemaTemplate {
    pub fn builder(schema: JsonSchemaValidator) -> SchemaBuilder {
        SchemaBuilder {
            schema,
            source: None,
            options: None,
            max_attempts: None,
            policy: FailurePolicy::Raise,
            on_failure: None,
            extra: Vec::new(),
        }
    }

    pub fn for_object(schema: &ObjectSchema) -> TemplateResult<SchemaBuilder> {
        Ok(Self::builder(JsonSchemaValidator::from_object_schema(schema)?))
    }

    pub(super) async fn execute(
        &self,
        session: &Session,
        ctx: &RunContext,
    ) -> TemplateResult<Session> {
        let accepted = self.guardrail.run(self.source.as_ref(), session, ctx).await?;
        let next = session.add_message(accepted.content.to_assistant_message());
        if !accepted.valid {
            return Ok(next);
        }
        match self.schema.parse(&accepted.content) {
            Ok(value) => Ok(next.set_attribute(STRUCTURED_OUTPUT_KEY, value)),
            Err(instruction) => {
                tracing::warn!(%instruction, "Accepted content no longer parses");
                Ok(next)
            }
        }
    }
}

/// Builder for [`SchemaTemplate`]
pub struct SchemaBuilder {
    schema: JsonSchemaValidator,
    source: Option<Arc<dyn ContentSource>>,
    options: Option<GenerationOptions>,
    max_attempts: Option<u32>,
    policy: FailurePolicy,
    on_failure: Option<FailureObserver>,
    extra: Vec<Arc<dyn Validator>>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn source(mut self, source: impl ContentSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn generate(mut self, options: GenerationOptions) -> Self {
        self.options = Some(options);
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    #[must_use]
    pub fn raise_error(mut self, raise: bool) -> Self {
        self.policy = if raise {
            FailurePolicy::Raise
        } else {
            FailurePolicy::Continue
        };
        self
    }

    #[must_use]
    pub fn on_failure(
        mut self,
        observer: impl Fn(&ValidationResult, &Content, u32) + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Some(Arc::new(observer));
        self
    }

    /// Additional check applied after the schema check
    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.extra.push(Arc::new(validator));
        self
    }

    pub fn build(self) -> TemplateResult<Template> {
        let source: Arc<dyn ContentSource> = match (self.source, self.options) {
            (Some(source), None) => source,
            (None, Some(options)) => Arc::new(GenerativeSource::new(options)),
            (None, None) => {
                return Err(TemplateError::configuration(
                    "schema template needs a content source or generation options",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(TemplateError::configuration(
                    "schema template takes a content source or generation options, not both",
                ))
            }
        };

        let validator: Arc<dyn Validator> = if self.extra.is_empty() {
            Arc::new(self.schema.clone())
        } else {
            let mut validators: Vec<Arc<dyn Validator>> = vec![Arc::new(self.schema.clone())];
            validators.extend(self.extra);
            Arc::new(All::new(validators))
        };

        let mut guardrail = Guardrail::from_arc(validator).policy(self.policy);
        if let Some(max_attempts) = self.max_attempts {
            guardrail = guardrail.max_attempts(max_attempts);
        }
        if let Some(observer) = self.on_failure {
            guardrail = guardrail
                .on_failure(move |result, content, attempt| observer(result, content, attempt));
        }

        Ok(Template::Primitive(Primitive::Schema(SchemaTemplate {
            source,
            schema: self.schema,
            guardrail,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::CallbackSource;
    use crate::schema::PropertyType;
    use crate::validate::FnValidator;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn product() -> ObjectSchema {
        ObjectSchema::new()
            .property("name", PropertyType::String)
            .property("price", PropertyType::Number)
            .required("name")
            .required("price")
    }

    fn replies(texts: &'static [&'static str]) -> (CallbackSource, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let source = CallbackSource::from_fn(move |_s: &Session| {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            texts[n.min(texts.len() - 1)].to_string()
        });
        (source, calls)
    }

    #[tokio::test]
    async fn retries_until_schema_matches() {
        let (source, calls) = replies(&[
            "no json",
            "{\"name\": \"X\"}",
            "{\"name\": \"X\", \"price\": 2}",
        ]);
        let template = SchemaTemplate::for_object(&product())
            .unwrap()
            .source(source)
            .max_attempts(3)
            .build()
            .unwrap();

        let out = template.execute(&Session::new(), &RunContext::default()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out.attribute(STRUCTURED_OUTPUT_KEY),
            Some(&json!({ "name": "X", "price": 2 }))
        );
    }

    #[tokio::test]
    async fn continue_policy_skips_structured_output() {
        let (source, calls) = replies(&["still no json"]);
        let template = SchemaTemplate::for_object(&product())
            .unwrap()
            .source(source)
            .max_attempts(2)
            .raise_error(false)
            .build()
            .unwrap();

        let out = template.execute(&Session::new(), &RunContext::default()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(out.messages()[0].content(), "still no json");
        assert!(out.attribute(STRUCTURED_OUTPUT_KEY).is_none());
    }

    #[tokio::test]
    async fn extra_validators_combine_with_schema() {
        let (source, calls) = replies(&[
            "{\"name\": \"free\", \"price\": 0}",
            "{\"name\": \"X\", \"price\": 5}",
        ]);
        let template = SchemaTemplate::for_object(&product())
            .unwrap()
            .source(source)
            .validator(FnValidator::predicate(|t| !t.contains("free"), "nothing is free"))
            .build()
            .unwrap();

        let out = template.execute(&Session::new(), &RunContext::default()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(out.attribute(STRUCTURED_OUTPUT_KEY), Some(&json!({ "name": "X", "price": 5 })));
    }

    #[test]
    fn build_requires_one_source() {
        let err = SchemaTemplate::for_object(&product()).unwrap().build().err().unwrap();
        assert!(err.is_configuration());
    }
}
