//! Ordered, append-only message storage shared by every memory strategy.
//!
//! Besides the messages themselves the store keeps each message's token
//! count (computed once, at append time) and pins a leading system message
//! outside the evictable body.

use std::ops::Range;

use thinkloop_core::error::MemoryError;
use thinkloop_core::message::{Message, Role};

#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    pinned: Option<(Message, usize)>,
    messages: Vec<Message>,
    tokens: Vec<usize>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message with its precomputed token count.
    ///
    /// A system message appended to an empty store becomes the pinned
    /// prompt. Tool results must answer an open call of the trailing
    /// assistant message, otherwise they would be orphaned.
    pub fn push(&mut self, message: Message, tokens: usize) -> Result<(), MemoryError> {
        if message.role == Role::System && self.pinned.is_none() && self.messages.is_empty() {
            self.pinned = Some((message, tokens));
            return Ok(());
        }
        if message.role == Role::Tool {
            let call_id = message.tool_call_id.as_deref().unwrap_or_default();
            if !self.is_open_call(call_id) {
                return Err(MemoryError::UnpairedToolResult(call_id.to_string()));
            }
        }
        self.messages.push(message);
        self.tokens.push(tokens);
        Ok(())
    }

    /// Whether `call_id` was requested by the trailing assistant message and
    /// has not been answered yet.
    fn is_open_call(&self, call_id: &str) -> bool {
        let Some(start) = self.messages.iter().rposition(|m| m.role != Role::Tool) else {
            return false;
        };
        let owner = &self.messages[start];
        owner.has_tool_calls()
            && owner.requested(call_id)
            && !self.messages[start + 1..]
                .iter()
                .any(|m| m.tool_call_id.as_deref() == Some(call_id))
    }

    /// The pinned system message, if any.
    pub fn pinned(&self) -> Option<&Message> {
        self.pinned.as_ref().map(|(m, _)| m)
    }

    pub fn pinned_tokens(&self) -> usize {
        self.pinned.as_ref().map_or(0, |(_, t)| *t)
    }

    /// The evictable messages, oldest first.
    pub fn body(&self) -> &[Message] {
        &self.messages
    }

    pub fn body_tokens(&self) -> usize {
        self.tokens.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Split the body into eviction units.
    ///
    /// An assistant message with tool calls and the tool results answering it
    /// form one unit; every other message is a unit of its own.
    pub fn units(&self) -> Vec<Range<usize>> {
        let mut units = Vec::new();
        let mut i = 0;
        while i < self.messages.len() {
            let owner = &self.messages[i];
            let mut end = i + 1;
            if owner.has_tool_calls() {
                while end < self.messages.len()
                    && self.messages[end].role == Role::Tool
                    && self.messages[end]
                        .tool_call_id
                        .as_deref()
                        .is_some_and(|id| owner.requested(id))
                {
                    end += 1;
                }
            }
            units.push(i..end);
            i = end;
        }
        units
    }

    pub fn unit_tokens(&self, unit: &Range<usize>) -> usize {
        self.tokens[unit.clone()].iter().sum()
    }

    /// Remove the first `count` body messages and return them.
    ///
    /// Callers pass a unit boundary so no tool pair is split.
    pub fn drain_front(&mut self, count: usize) -> Vec<Message> {
        let count = count.min(self.messages.len());
        self.tokens.drain(..count);
        self.messages.drain(..count).collect()
    }

    /// Pinned message followed by the body.
    pub fn view(&self) -> Vec<Message> {
        self.pinned()
            .into_iter()
            .chain(self.messages.iter())
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.pinned = None;
        self.messages.clear();
        self.tokens.clear();
    }
}
