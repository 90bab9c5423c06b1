//! Tool execution collaborator
//!
//! Assistant turns may carry tool calls. A `ToolExecutor` turns each call
//! into a [`ToolOutput`], which the tool-results template records as a
//! `tool_result` message.

use crate::session::ToolCall;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// Executor for tool calls
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute one call. Unknown tools yield `None`.
    async fn execute(&self, call: &ToolCall) -> Option<ToolOutput>;
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(&self, call: &ToolCall) -> Option<ToolOutput> {
        (**self).execute(call).await
    }
}

type ToolFn = Arc<dyn Fn(Value) -> BoxFuture<'static, ToolOutput> + Send + Sync>;

/// Executor dispatching by tool name to async closures
#[derive(Clone, Default)]
pub struct FnToolExecutor {
    tools: HashMap<String, ToolFn>,
}

impl FnToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tool<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolOutput> + Send + 'static,
    {
        let tool: ToolFn = Arc::new(move |input| Box::pin(f(input)));
        self.tools.insert(name.into(), tool);
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl ToolExecutor for FnToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Option<ToolOutput> {
        let tool = self.tools.get(&call.name)?;
        Some(tool(call.arguments.clone()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn dispatches_by_name() {
        let executor = FnToolExecutor::new().with_tool("add", |input: Value| async move {
            let a = input["a"].as_i64().unwrap_or(0);
            let b = input["b"].as_i64().unwrap_or(0);
            ToolOutput::success((a + b).to_string())
        });

        let output = executor
            .execute(&ToolCall::new("c1", "add", json!({ "a": 2, "b": 3 })))
            .await;
        assert_eq!(output, Some(ToolOutput::success("5")));

        let missing = executor
            .execute(&ToolCall::new("c2", "sub", json!({})))
            .await;
        assert!(missing.is_none());
        assert_eq!(executor.tool_names(), vec!["add"]);
    }
}
