//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! endpoint exposing `/v1/chat/completions`.
//!
//! Supports non-streaming chat completions with tool calling.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thinkloop_config::ModelCost;
use thinkloop_core::error::ProviderError;
use thinkloop_core::message::{Message, Role, ToolCall};
use thinkloop_core::provider::{LlmClient, LlmRequest, LlmResponse, Usage};
use thinkloop_core::tool::ToolDescriptor;
use tracing::{debug, warn};

/// HTTP timeout for a single completion; the agent may impose a shorter one.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Retry hint used when a 429 carries no `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_context: HashMap<String, usize>,
    pricing: HashMap<String, ModelCost>,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// An empty `api_key` sends no `Authorization` header (local servers).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
            max_context: HashMap::new(),
            pricing: HashMap::new(),
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Record the context window of `model`.
    pub fn with_max_context(mut self, model: impl Into<String>, tokens: usize) -> Self {
        self.max_context.insert(model.into(), tokens);
        self
    }

    /// Record the price of `model`, used to fill [`Usage::cost`].
    pub fn with_pricing(mut self, model: impl Into<String>, cost: ModelCost) -> Self {
        self.pricing.insert(model.into(), cost);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_body(request: &LlmRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": to_api_messages(&request.messages),
            "stream": false,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(to_api_tools(&request.tools));
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let mut http = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            http = http.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = http.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(status_error(status, error_body, &request.model, retry_after));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        parse_response(api_response, self.pricing.get(&request.model))
    }

    fn max_context(&self, model: &str) -> Option<usize> {
        self.max_context.get(model).copied()
    }
}

/// Map a non-200 status to a provider error.
fn status_error(
    status: u16,
    body: String,
    model: &str,
    retry_after_secs: Option<u64>,
) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        404 => ProviderError::ModelNotFound(model.to_string()),
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

fn parse_response(
    api: ApiResponse,
    pricing: Option<&ModelCost>,
) -> Result<LlmResponse, ProviderError> {
    let choice = api
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall::new(tc.id, tc.function.name, parse_arguments(tc.function.arguments)))
        .collect();

    let usage = api
        .usage
        .map(|u| {
            let cost = pricing.map_or(0.0, |p| {
                (f64::from(u.prompt_tokens) * p.input_per_m
                    + f64::from(u.completion_tokens) * p.output_per_m)
                    / 1_000_000.0
            });
            Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                cost,
            }
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        content: choice.message.content.filter(|c| !c.is_empty()),
        tool_calls,
        usage,
    })
}

/// Models send arguments as a JSON string. Unparsable text is kept as a
/// string value so the registry reports it back to the model.
fn parse_arguments(raw: String) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
}

fn render_arguments(arguments: &serde_json::Value) -> String {
    match arguments {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
    messages
        .iter()
        .map(|m| ApiMessage {
            role: m.role.as_str().into(),
            content: match (m.role, m.content.is_empty() && m.has_tool_calls()) {
                (Role::Assistant, true) => None,
                _ => Some(m.content.clone()),
            },
            tool_calls: if m.tool_calls.is_empty() {
                None
            } else {
                Some(
                    m.tool_calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: render_arguments(&tc.arguments),
                            },
                        })
                        .collect(),
                )
            },
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}

fn to_api_tools(tools: &[ToolDescriptor]) -> Vec<serde_json::Value> {
    tools.iter().map(ToolDescriptor::to_schema).collect()
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
