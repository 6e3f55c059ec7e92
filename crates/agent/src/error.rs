//! Failures that end a run.
//!
//! Running out of iterations or being cancelled are not errors; they are
//! reported through [`RunOutcome`](crate::RunOutcome).

use thinkloop_core::error::{MemoryError, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model call failed. Memory holds nothing from that call.
    #[error("Model call failed: {0}")]
    ModelCall(#[from] ProviderError),

    /// Memory rejected a message or could not fit the history in budget.
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    /// The loop was built with an unusable setting.
    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),
}
