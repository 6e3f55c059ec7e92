//! LLM calling interface — the abstraction over model backends.
//!
//! The reasoning loop and the summarizing memory only ever talk to a model
//! through [`LlmClient`]. Concrete transports live in `thinkloop-providers`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};
use crate::token::{HeuristicCounter, TokenCounter};
use crate::tool::ToolDescriptor;

/// A single model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,

    /// Sampling temperature; provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }
}

/// Token usage and cost of one or more calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// Estimated cost in USD
    #[serde(default)]
    pub cost: f64,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.cost += rhs.cost;
    }
}

/// A complete response from a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text, if any
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the model, in emission order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Token usage statistics
    #[serde(default)]
    pub usage: Usage,
}

impl LlmResponse {
    /// A plain text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            usage: Usage::default(),
        }
    }

    /// A response requesting tool calls.
    pub fn tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content,
            tool_calls,
            usage: Usage::default(),
        }
    }

    /// Convert into the assistant message recorded in memory.
    pub fn to_message(&self) -> Message {
        let content = self.content.clone().unwrap_or_default();
        if self.tool_calls.is_empty() {
            Message::assistant(content)
        } else {
            Message::assistant_with_tools(content, self.tool_calls.clone())
        }
    }
}

/// The model-calling capability.
///
/// Every backend (OpenAI-compatible HTTP, scripted test doubles) implements
/// this trait. Besides the call itself it exposes, per model, the maximum
/// context length and the token counter the memory strategies budget with.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, ProviderError>;

    /// Maximum context length of `model` in tokens, if known.
    fn max_context(&self, _model: &str) -> Option<usize> {
        None
    }

    /// Token counter matching `model`'s tokenizer.
    ///
    /// Default is the 4-characters-per-token heuristic.
    fn token_counter(&self, _model: &str) -> Arc<dyn TokenCounter> {
        Arc::new(HeuristicCounter)
    }
}
