//! Variable interpolation for configured prompt text
//!
//! Text is rendered with minijinja against the session attributes.
//! Undefined variables render as the empty string.

use crate::error::TemplateError;
use crate::session::Attributes;
use minijinja::{Environment, UndefinedBehavior};

/// Render `text` with `{{ key }}` placeholders resolved from `attributes`
pub fn render(text: &str, attributes: &Attributes) -> Result<String, TemplateError> {
    if !text.contains("{{") && !text.contains("{%") {
        return Ok(text.to_string());
    }
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env.set_keep_trailing_newline(true);
    Ok(env.render_str(text, attributes)?)
}
