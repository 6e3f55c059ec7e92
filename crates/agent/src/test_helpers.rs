//! Shared test helpers for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use thinkloop_core::error::ProviderError;
use thinkloop_core::message::ToolCall;
use thinkloop_core::provider::{LlmClient, LlmRequest, LlmResponse, Usage};

/// A mock client that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next entry in the queue; once the
/// queue is empty the `repeat` response (if any) is returned forever.
/// Panics if it runs out of responses.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<LlmResponse, ProviderError>>>,
    repeat: Option<LlmResponse>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Result<LlmResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Return `response` for every call.
    pub fn repeating(response: LlmResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(Vec::new())
        }
    }

    /// A single final answer.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![Ok(make_text_response(text))])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.repeat {
            Some(response) => Ok(response.clone()),
            None => panic!("ScriptedClient: no more responses (call #{call})"),
        }
    }
}

/// A client whose calls never complete.
pub struct PendingClient;

#[async_trait::async_trait]
impl LlmClient for PendingClient {
    fn name(&self) -> &str {
        "pending_mock"
    }

    async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        std::future::pending().await
    }
}

fn mock_usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        cost: 0.001,
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> LlmResponse {
    LlmResponse {
        usage: mock_usage(),
        ..LlmResponse::text(text)
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>, thought: &str) -> LlmResponse {
    let content = (!thought.is_empty()).then(|| thought.to_string());
    LlmResponse {
        usage: mock_usage(),
        ..LlmResponse::tool_calls(content, tool_calls)
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args)
}

pub fn weather_call(id: &str, location: &str) -> ToolCall {
    make_tool_call(id, "get_weather", serde_json::json!({ "location": location }))
}
