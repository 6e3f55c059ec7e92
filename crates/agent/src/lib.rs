//! The reasoning loop for thinkloop.
//!
//! The agent follows a **Reason → Act → Observe** cycle:
//!
//! 1. **Receive** a user message
//! 2. **Bound the history** (compacting memory if the next call would not fit)
//! 3. **Send to the model** with the registered tool descriptors
//! 4. **If tool calls**: run them in order, append results, loop back to step 2
//! 5. **If text response**: the run is done
//!
//! The loop also stops when the iteration budget runs out or the run is
//! cancelled.

pub mod builder;
pub mod error;
pub mod react;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use builder::build_memory;
pub use error::AgentError;
pub use react::{CancelReason, LoopState, ReactLoop, RunOutcome, RunStats};
