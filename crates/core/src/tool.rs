//! Tools — the abstraction over agent capabilities.
//!
//! A tool is a [`ToolDescriptor`] (what the model sees) paired with a
//! [`ToolHandler`] (what runs). Tools are registered once at startup into a
//! [`ToolRegistry`], which rejects duplicate names, validates arguments
//! against the descriptor, and turns every failure into a textual tool
//! result so the reasoning loop keeps going.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::message::ToolCall;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
        }
    }

    fn matches(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Integer => value.is_i64() || value.is_u64(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Array => value.is_array(),
            ParameterType::Object => matches!(value, Value::Object(_)),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// The only tool kind models understand today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Function,
}

/// What the model is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ToolKind,
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
}

impl ToolDescriptor {
    /// Start a function tool descriptor with no parameters.
    pub fn function(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ToolKind::Function,
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: ParameterType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.insert(
            name.into(),
            ParameterSpec {
                kind,
                description: description.into(),
                required,
            },
        );
        self
    }

    /// Render in the function-calling JSON shape sent to the model.
    pub fn to_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "type": spec.kind.as_str(),
                        "description": spec.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect();

        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                },
            },
        })
    }

    /// Check `arguments` against the declared parameters.
    ///
    /// Unknown keys are passed through; models routinely add harmless extras.
    pub fn validate(&self, arguments: &serde_json::Value) -> Result<ToolArguments, ValidationError> {
        let map = match arguments {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => return Err(ValidationError::NotAnObject(json_type_name(other))),
        };

        for (name, spec) in &self.parameters {
            match map.get(name) {
                None | Some(serde_json::Value::Null) if spec.required => {
                    return Err(ValidationError::MissingRequired(name.clone()));
                }
                Some(value) if !value.is_null() && !spec.kind.matches(value) => {
                    return Err(ValidationError::WrongType {
                        name: name.clone(),
                        expected: spec.kind.as_str(),
                        found: json_type_name(value),
                    });
                }
                _ => {}
            }
        }

        Ok(ToolArguments(map))
    }
}

/// Why a tool call's arguments were rejected before the handler ran.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required argument '{0}'")]
    MissingRequired(String),

    #[error("argument '{name}' must be {expected}, got {found}")]
    WrongType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Arguments that passed validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(pub serde_json::Map<String, serde_json::Value>);

impl ToolArguments {
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }
}

/// The code that runs when a tool is called.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: ToolArguments) -> Result<String, ToolError>;
}

/// Adapts a synchronous closure into a [`ToolHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(ToolArguments) -> Result<String, ToolError> + Send + Sync,
{
    async fn call(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        (self.0)(arguments)
    }
}

/// The outcome of one dispatch, ready to become a tool message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    fn ok(output: String) -> Self {
        Self {
            output,
            is_error: false,
        }
    }

    fn error(err: &ToolError) -> Self {
        Self {
            output: format!("Error: {err}"),
            is_error: true,
        }
    }
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

/// Name → tool mapping, immutable once the process has started running tasks.
///
/// The agent loop uses this to:
/// 1. Get tool descriptors to send to the model
/// 2. Dispatch the model's tool calls, isolating every failure
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a static list, failing on the first duplicate.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (ToolDescriptor, Arc<dyn ToolHandler>)>,
    ) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        for (descriptor, handler) in entries {
            registry.register(descriptor, handler)?;
        }
        Ok(registry)
    }

    /// Register a tool. Duplicate names are rejected.
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(ToolError::Duplicate(descriptor.name));
        }
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool { descriptor, handler });
        Ok(())
    }

    /// Get a tool descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i].descriptor)
    }

    /// All descriptors in registration order (for sending to the model).
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.descriptor.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool and render the outcome as text.
    ///
    /// Never fails: unknown tools, invalid arguments, handler errors and
    /// handler panics all become an error payload.
    pub async fn dispatch(&self, name: &str, arguments: &serde_json::Value) -> ToolResult {
        match self.try_dispatch(name, arguments).await {
            Ok(output) => ToolResult::ok(output),
            Err(err) => {
                warn!(tool = %name, error = %err, "Tool call failed");
                ToolResult::error(&err)
            }
        }
    }

    /// Dispatch a model-issued tool call.
    pub async fn dispatch_call(&self, call: &ToolCall) -> ToolResult {
        self.dispatch(&call.name, &call.arguments).await
    }

    async fn try_dispatch(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<String, ToolError> {
        let tool = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let args = tool
            .descriptor
            .validate(arguments)
            .map_err(|source| ToolError::InvalidArguments {
                tool_name: name.to_string(),
                source,
            })?;

        debug!(tool = %name, "Dispatching tool");
        match AssertUnwindSafe(tool.handler.call(args)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ToolError::Panicked {
                tool_name: name.to_string(),
                message: panic_message(panic.as_ref()),
            }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
