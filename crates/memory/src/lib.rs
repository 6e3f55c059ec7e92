//! Conversation memory for thinkloop agents.
//!
//! Two strategies keep a task's history within budget:
//!
//! - [`SlidingWindowMemory`]: drops the oldest messages once a message-count
//!   or token bound is crossed.
//! - [`SummarizingMemory`]: asks a model to fold old messages into a summary
//!   when the next call would overflow the context window.
//!
//! Both keep the leading system prompt pinned and never split an assistant
//! tool-call message from its results.

pub mod artifact;
pub mod prompt;
pub mod sliding_window;
pub mod store;
pub mod summarizing;

pub use artifact::SummaryArtifact;
pub use sliding_window::SlidingWindowMemory;
pub use store::MessageStore;
pub use summarizing::{CompactionMode, CompactionReport, DEFAULT_MAX_CONTEXT, SummarizingMemory};

use std::sync::Arc;

use thinkloop_core::error::MemoryError;
use thinkloop_core::message::Message;
use thinkloop_core::token::TokenCounter;
use thinkloop_core::tool::ToolDescriptor;

/// The memory owned by one agent run.
pub enum Memory {
    SlidingWindow(SlidingWindowMemory),
    Summarizing(SummarizingMemory),
}

impl Memory {
    /// Strategy name, as used in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            Memory::SlidingWindow(_) => "sliding_window",
            Memory::Summarizing(_) => "summarizing",
        }
    }

    pub fn add(&mut self, message: Message) -> Result<(), MemoryError> {
        match self {
            Memory::SlidingWindow(m) => m.add(message),
            Memory::Summarizing(m) => m.add(message),
        }
    }

    /// The history to send to the model, in order.
    pub fn messages(&self) -> Vec<Message> {
        match self {
            Memory::SlidingWindow(m) => m.messages(),
            Memory::Summarizing(m) => m.messages(),
        }
    }

    pub fn clear(&mut self) -> Result<(), MemoryError> {
        match self {
            Memory::SlidingWindow(m) => {
                m.clear();
                Ok(())
            }
            Memory::Summarizing(m) => m.clear(),
        }
    }

    pub fn token_count(&self) -> usize {
        match self {
            Memory::SlidingWindow(m) => m.token_count(),
            Memory::Summarizing(m) => m.token_count(),
        }
    }

    /// Messages in the evictable history (excludes the pinned prompt and
    /// any summary).
    pub fn len(&self) -> usize {
        match self {
            Memory::SlidingWindow(m) => m.store().len(),
            Memory::Summarizing(m) => m.store().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        match self {
            Memory::SlidingWindow(m) => m.counter(),
            Memory::Summarizing(m) => m.counter(),
        }
    }

    /// Bring the history within budget before a model call that will also
    /// carry `tools`.
    ///
    /// The sliding window enforces its bounds on every `add`, so this is a
    /// no-op for it.
    pub async fn prepare(
        &mut self,
        tools: &[ToolDescriptor],
    ) -> Result<Option<CompactionReport>, MemoryError> {
        match self {
            Memory::SlidingWindow(_) => Ok(None),
            Memory::Summarizing(m) => m.compact(tools).await,
        }
    }
}

impl From<SlidingWindowMemory> for Memory {
    fn from(memory: SlidingWindowMemory) -> Self {
        Memory::SlidingWindow(memory)
    }
}

impl From<SummarizingMemory> for Memory {
    fn from(memory: SummarizingMemory) -> Self {
        Memory::Summarizing(memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thinkloop_core::token::HeuristicCounter;

    #[tokio::test]
    async fn sliding_window_prepare_is_noop() {
        let mut memory: Memory =
            SlidingWindowMemory::new(3, usize::MAX, Arc::new(HeuristicCounter)).into();
        for i in 0..5 {
            memory.add(Message::user(format!("m{i}"))).unwrap();
        }
        assert_eq!(memory.kind(), "sliding_window");
        assert!(memory.prepare(&[]).await.unwrap().is_none());
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.messages().len(), 3);
    }

    #[test]
    fn unpaired_tool_result_surfaces_through_enum() {
        let mut memory: Memory =
            SlidingWindowMemory::new(10, usize::MAX, Arc::new(HeuristicCounter)).into();
        let err = memory
            .add(Message::tool_result("ghost", "get_weather", "sunny"))
            .unwrap_err();
        assert!(matches!(err, MemoryError::UnpairedToolResult(_)));
        assert!(memory.is_empty());
    }

    #[test]
    fn clear_empties_history() {
        let mut memory: Memory =
            SlidingWindowMemory::new(10, usize::MAX, Arc::new(HeuristicCounter)).into();
        memory.add(Message::system("sys")).unwrap();
        memory.add(Message::user("hi")).unwrap();
        memory.clear().unwrap();
        assert!(memory.messages().is_empty());
        assert_eq!(memory.token_count(), 0);
    }
}
