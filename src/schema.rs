//! Structured output extraction
//!
//! Locates a JSON payload in generated content and checks it against a
//! declared schema. Lookup order: a fenced code block, then the first bare
//! `{...}` object that parses, then native tool-call arguments.

use crate::content::Content;
use crate::error::TemplateError;
use crate::session::{Session, ToolCall};
use crate::validate::{ValidationResult, Validator};
use async_trait::async_trait;
use jsonschema::Draft;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::{Arc, LazyLock};

/// Session attribute receiving the accepted structured object
pub const STRUCTURED_OUTPUT_KEY: &str = "structured_output";

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("static regex")
});

/// Find and parse the JSON payload of a response
pub fn extract_json(text: &str, tool_calls: &[ToolCall]) -> Option<Value> {
    for captures in FENCED_BLOCK.captures_iter(text) {
        if let Some(body) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
                return Some(value);
            }
        }
    }

    // first `{` that opens a complete object; stray prose braces are skipped
    let bare = text.match_indices('{').find_map(|(start, _)| {
        let rest = text.get(start..)?;
        serde_json::Deserializer::from_str(rest)
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
    });
    if bare.is_some() {
        return bare;
    }

    tool_calls.iter().find_map(|call| match &call.arguments {
        Value::String(raw) => serde_json::from_str(raw).ok(),
        Value::Null => None,
        other => Some(other.clone()),
    })
}

/// JSON type of a declared property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl PropertyType {
    fn as_str(self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Number => "number",
            PropertyType::Integer => "integer",
            PropertyType::Boolean => "boolean",
            PropertyType::Array => "array",
            PropertyType::Object => "object",
        }
    }
}

/// Declared object shape: typed properties plus required fields
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    properties: Vec<(String, PropertyType, Option<String>)>,
    required: Vec<String>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn property(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.properties.push((name.into(), ty, None));
        self
    }

    #[must_use]
    pub fn described(
        mut self,
        name: impl Into<String>,
        ty: PropertyType,
        description: impl Into<String>,
    ) -> Self {
        self.properties.push((name.into(), ty, Some(description.into())));
        self
    }

    #[must_use]
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    /// Lower to a JSON Schema document
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, ty, description)| {
                let mut prop = json!({ "type": ty.as_str() });
                if let Some(description) = description {
                    prop["description"] = json!(description);
                }
                (name.clone(), prop)
            })
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

/// Extracts a JSON payload and checks it against a JSON Schema
#[derive(Clone)]
pub struct JsonSchemaValidator {
    schema: Value,
    compiled: Arc<jsonschema::Validator>,
}

impl JsonSchemaValidator {
    pub fn new(schema: Value) -> Result<Self, TemplateError> {
        let compiled = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .map_err(|e| TemplateError::configuration(format!("invalid JSON schema: {e}")))?;
        Ok(Self {
            schema,
            compiled: Arc::new(compiled),
        })
    }

    pub fn from_object_schema(schema: &ObjectSchema) -> Result<Self, TemplateError> {
        Self::new(schema.to_json_schema())
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Locate, parse and check the payload; the error is a retry instruction
    pub fn parse(&self, content: &Content) -> Result<Value, String> {
        let value = extract_json(&content.text, &content.tool_calls)
            .ok_or_else(|| {
                "Respond with a single JSON object inside a ```json code block.".to_string()
            })?;

        let messages: Vec<String> = self
            .compiled
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            return Err(format!(
                "The JSON does not match the required schema:\n- {}",
                messages.join("\n- ")
            ));
        }
        Ok(value)
    }
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Validator for JsonSchemaValidator {
    async fn validate(&self, content: &Content, _session: &Session) -> ValidationResult {
        match self.parse(content) {
            Ok(_) => ValidationResult::Valid,
            Err(instruction) => ValidationResult::invalid(instruction),
        }
    }
}
