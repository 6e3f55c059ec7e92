//! Sliding-window memory: hard truncation of the oldest messages.

use std::sync::Arc;

use thinkloop_core::error::MemoryError;
use thinkloop_core::message::Message;
use thinkloop_core::token::TokenCounter;
use tracing::debug;

use crate::store::MessageStore;

/// Keeps the most recent messages within a message-count and token bound.
///
/// The pinned system message is never evicted and does not count against
/// either bound. Eviction removes whole units (an assistant tool-call
/// message together with its results), and the newest unit always stays,
/// so a bound can be exceeded by at most one unit.
pub struct SlidingWindowMemory {
    store: MessageStore,
    max_messages: usize,
    max_tokens: usize,
    counter: Arc<dyn TokenCounter>,
}

impl SlidingWindowMemory {
    pub fn new(max_messages: usize, max_tokens: usize, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            store: MessageStore::new(),
            max_messages,
            max_tokens,
            counter,
        }
    }

    pub fn add(&mut self, message: Message) -> Result<(), MemoryError> {
        let tokens = self.counter.count_message(&message);
        self.store.push(message, tokens)?;
        self.evict();
        Ok(())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.view()
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn token_count(&self) -> usize {
        self.store.pinned_tokens() + self.store.body_tokens()
    }

    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    fn within_bounds(&self) -> bool {
        self.store.len() <= self.max_messages && self.store.body_tokens() <= self.max_tokens
    }

    fn evict(&mut self) {
        let mut evicted = 0;
        while !self.within_bounds() {
            let units = self.store.units();
            if units.len() <= 1 {
                break;
            }
            evicted += self.store.drain_front(units[0].end).len();
        }
        if evicted > 0 {
            debug!(
                evicted,
                remaining = self.store.len(),
                tokens = self.store.body_tokens(),
                "Sliding window evicted messages"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thinkloop_core::message::{Role, ToolCall};
    use thinkloop_core::token::HeuristicCounter;

    fn window(max_messages: usize, max_tokens: usize) -> SlidingWindowMemory {
        SlidingWindowMemory::new(max_messages, max_tokens, Arc::new(HeuristicCounter))
    }

    fn weather_call(id: &str) -> ToolCall {
        ToolCall::new(id, "get_weather", serde_json::json!({"location": "Rome"}))
    }

    /// Every tool message answers a surviving assistant call and every
    /// surviving call has its answer.
    fn assert_paired(messages: &[Message]) {
        for (i, msg) in messages.iter().enumerate() {
            if msg.role == Role::Tool {
                let id = msg.tool_call_id.as_deref().unwrap();
                assert!(
                    messages[..i].iter().any(|m| m.requested(id)),
                    "orphaned tool result {id}"
                );
            }
            for call in &msg.tool_calls {
                assert!(
                    messages[i + 1..]
                        .iter()
                        .any(|m| m.tool_call_id.as_deref() == Some(call.id.as_str())),
                    "dangling tool call {}",
                    call.id
                );
            }
        }
    }

    #[test]
    fn keeps_last_four_of_six() {
        let mut mem = window(4, usize::MAX);
        for i in 0..6 {
            let msg = if i % 2 == 0 {
                Message::user(format!("u{i}"))
            } else {
                Message::assistant(format!("a{i}"))
            };
            mem.add(msg).unwrap();
        }

        let contents: Vec<String> = mem.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["u2", "a3", "u4", "a5"]);
    }

    #[test]
    fn system_message_survives_and_is_not_counted() {
        let mut mem = window(2, usize::MAX);
        mem.add(Message::system("you are helpful")).unwrap();
        for i in 0..5 {
            mem.add(Message::user(format!("m{i}"))).unwrap();
        }

        let msgs = mem.messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].content, "m3");
        assert_eq!(msgs[2].content, "m4");
    }

    #[test]
    fn only_system_message_is_within_bounds() {
        let mut mem = window(1, 1);
        mem.add(Message::system("a very long system prompt that is far over one token"))
            .unwrap();
        assert_eq!(mem.messages().len(), 1);
    }

    #[test]
    fn token_bound_evicts_oldest() {
        // Each message: 4 overhead + 10 tokens of content
        let text = "x".repeat(40);
        let mut mem = window(100, 30);
        for _ in 0..4 {
            mem.add(Message::user(text.clone())).unwrap();
        }
        assert_eq!(mem.messages().len(), 2);
        assert!(mem.token_count() <= 30);
    }

    #[test]
    fn tool_pair_is_evicted_as_one_unit() {
        let mut mem = window(3, usize::MAX);
        mem.add(Message::user("weather in Rome?")).unwrap();
        mem.add(Message::assistant_with_tools("", vec![weather_call("c1"), weather_call("c2")]))
            .unwrap();
        mem.add(Message::tool_result("c1", "get_weather", "sunny")).unwrap();
        mem.add(Message::tool_result("c2", "get_weather", "warm")).unwrap();
        mem.add(Message::assistant("It is sunny and warm.")).unwrap();

        let msgs = mem.messages();
        assert_paired(&msgs);
        // The user message went first, then the whole tool unit.
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "It is sunny and warm.");
    }

    #[test]
    fn newest_unit_is_kept_even_over_bound() {
        let mut mem = window(2, usize::MAX);
        mem.add(Message::user("q")).unwrap();
        mem.add(Message::assistant_with_tools(
            "",
            vec![weather_call("a"), weather_call("b"), weather_call("c")],
        ))
        .unwrap();
        for id in ["a", "b", "c"] {
            mem.add(Message::tool_result(id, "get_weather", "ok")).unwrap();
        }

        let msgs = mem.messages();
        assert_paired(&msgs);
        // One unit of four messages: over the bound by less than one unit.
        assert_eq!(msgs.len(), 4);
        assert!(msgs[0].has_tool_calls());
    }

    #[test]
    fn pairing_holds_across_many_rounds() {
        let mut mem = window(5, 200);
        mem.add(Message::system("sys")).unwrap();
        mem.add(Message::user("start")).unwrap();
        for round in 0..20 {
            let id = format!("call_{round}");
            mem.add(Message::assistant_with_tools("thinking", vec![weather_call(&id)]))
                .unwrap();
            mem.add(Message::tool_result(&id, "get_weather", "cloudy")).unwrap();
            assert_paired(&mem.messages());
            assert!(mem.store().len() <= 5 + 1);
        }
    }

    #[test]
    fn clear_resets_everything() {
        let mut mem = window(10, usize::MAX);
        mem.add(Message::system("sys")).unwrap();
        mem.add(Message::user("hi")).unwrap();
        mem.clear();
        assert!(mem.messages().is_empty());
        assert_eq!(mem.token_count(), 0);
    }
}
