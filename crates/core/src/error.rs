//! Error types for the thinkloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::tool::ValidationError;

/// The top-level error type for thinkloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A failure of the model-calling transport or the provider behind it.
///
/// These are never retried by the reasoning loop; retry policy belongs to
/// the provider client.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Compaction could not bring the history under the context budget.
    #[error("Context overflow: {required} tokens required, budget is {budget}")]
    Overflow { required: usize, budget: usize },

    #[error("Tool result '{0}' does not answer any tool call in memory")]
    UnpairedToolResult(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid memory configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Invalid arguments for {tool_name}: {source}")]
    InvalidArguments {
        tool_name: String,
        #[source]
        source: ValidationError,
    },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool panicked: {tool_name}: {message}")]
    Panicked { tool_name: String, message: String },
}
