//! Engine configuration

use std::str::FromStr;

const DEFAULT_MAX_ITERATIONS: u32 = 10;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Engine-wide defaults, overridable per template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Loop iteration cap when a loop sets none
    pub max_iterations: u32,
    /// Guardrail attempt cap when a guardrail sets none
    pub max_attempts: u32,
    /// Provider used when generation options name none
    pub default_provider: Option<String>,
    /// Content of a user turn that has no source and no input collaborator
    pub user_default: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_provider: None,
            user_default: String::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparsable numbers fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: parse_or(&lookup, "CHATFLOW_MAX_ITERATIONS", defaults.max_iterations),
            max_attempts: parse_or(&lookup, "CHATFLOW_MAX_ATTEMPTS", defaults.max_attempts),
            default_provider: lookup("CHATFLOW_DEFAULT_PROVIDER").filter(|p| !p.is_empty()),
            user_default: lookup("CHATFLOW_USER_DEFAULT").unwrap_or(defaults.user_default),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparsable config value");
            default
        }),
        None => default,
    }
}
