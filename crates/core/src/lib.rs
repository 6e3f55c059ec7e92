//! # thinkloop core
//!
//! Domain types, traits, and error definitions for the thinkloop ReAct runtime.
//! This crate has no runtime or transport dependencies. It defines the
//! domain model that the memory, tool, provider and agent crates build on.
//!
//! ## Layout
//!
//! - [`message`]: messages, roles, tool calls and task identifiers
//! - [`provider`]: the [`LlmClient`] capability the reasoning loop calls
//! - [`tool`]: tool descriptors, argument validation and the [`ToolRegistry`]
//! - [`token`]: token counting used for budget enforcement
//! - [`error`]: one error enum per bounded context

pub mod error;
pub mod message;
pub mod provider;
pub mod token;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, Result, ToolError};
pub use message::{Message, Role, TaskId, ToolCall};
pub use provider::{LlmClient, LlmRequest, LlmResponse, Usage};
pub use token::{HeuristicCounter, TokenCounter};
pub use tool::{
    FnHandler, ParameterSpec, ParameterType, ToolArguments, ToolDescriptor, ToolHandler, ToolRegistry,
    ToolResult, ValidationError,
};
