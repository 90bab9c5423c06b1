//! Mock implementations for testing
//!
//! These mocks let template trees run without a real provider or terminal.

use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::session::{Message, Role};
use crate::tools::{ToolExecutor, ToolOutput};
use crate::session::ToolCall;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Responder = Arc<dyn Fn(&LlmRequest) -> Result<LlmResponse, LlmError> + Send + Sync>;

// ============================================================================
// Mock LLM Service
// ============================================================================

/// Mock provider that returns queued responses, or asks a responder closure
/// once the queue is empty
pub struct MockLlmService {
    provider_id: String,
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    responder: Option<Responder>,
    calls: AtomicUsize,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            responses: Mutex::new(VecDeque::new()),
            responder: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Mock answering every request with `f`
    pub fn with_responder(
        provider_id: impl Into<String>,
        f: impl Fn(&LlmRequest) -> Result<LlmResponse, LlmError> + Send + Sync + 'static,
    ) -> Self {
        let mut mock = Self::new(provider_id);
        mock.responder = Some(Arc::new(f));
        mock
    }

    /// Mock replying with each text in order
    pub fn scripted<I, S>(provider_id: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new(provider_id);
        for reply in replies {
            mock.queue_response(LlmResponse::text(reply));
        }
        mock
    }

    /// Mock that fails every request
    pub fn failing(provider_id: impl Into<String>) -> Self {
        Self::with_responder(provider_id, |_| Err(LlmError::server_error("mock failure")))
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(queued) = self.responses.lock().unwrap().pop_front() {
            return queued;
        }
        match &self.responder {
            Some(responder) => responder(request),
            None => Err(LlmError::network("No mock response queued")),
        }
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }
}

/// Text of the latest user turn in a request, for echo-style responders
pub fn last_user_text(request: &LlmRequest) -> String {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role() == Role::User)
        .map(Message::content)
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Recording Tool Executor
// ============================================================================

/// Tool executor that echoes arguments and records every call
#[derive(Default)]
pub struct RecordingToolExecutor {
    pub executions: Mutex<Vec<ToolCall>>,
    fail_names: Vec<String>,
}

impl RecordingToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls to these tools report failure
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            executions: Mutex::new(Vec::new()),
            fail_names: names.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn recorded_executions(&self) -> Vec<ToolCall> {
        self.executions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingToolExecutor {
    async fn execute(&self, call: &ToolCall) -> Option<ToolOutput> {
        self.executions.lock().unwrap().push(call.clone());
        if call.name == "unknown" {
            return None;
        }
        if self.fail_names.contains(&call.name) {
            return Some(ToolOutput::error(format!("{} failed", call.name)));
        }
        Some(ToolOutput::success(call.arguments.to_string()))
    }
}
