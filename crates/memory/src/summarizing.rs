//! Summarizing memory: folds old history into a carried-forward summary.
//!
//! The budget is the model's maximum context. `reserve_ratio` of it is kept
//! for the most recent messages; the rest is available to the summary.
//! When the next model call would not fit, the oldest span of whole units
//! (everything older than the reserved tail) is summarized by the model and
//! replaced by a single summary message. The summary is persisted to
//! `<workspace>/<task_id>/summary.md` after each compaction.
//!
//! Compaction awaits the model before touching any state, so dropping the
//! future part-way (e.g. on cancellation) leaves memory as it was.

use std::path::Path;
use std::sync::Arc;

use thinkloop_core::error::{MemoryError, ProviderError};
use thinkloop_core::message::{Message, TaskId};
use thinkloop_core::provider::{LlmClient, LlmRequest};
use thinkloop_core::token::TokenCounter;
use thinkloop_core::tool::ToolDescriptor;
use tracing::{debug, info, warn};

use crate::artifact::SummaryArtifact;
use crate::prompt::{compress_prompt, render_summary, summary_prompt};
use crate::store::MessageStore;

/// Context budget used when the client does not know the model.
pub const DEFAULT_MAX_CONTEXT: usize = 8000;

const SUMMARY_HEADER: &str = "Previous conversation summary:";
const SUMMARY_SEPARATOR: &str = "\n\n---\n\n";

/// How a compaction shrank the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionMode {
    /// The span was replaced by a model-written summary.
    Summarized,
    /// The summarization call failed; the span was dropped.
    Truncated,
    /// Only the existing summary was rewritten shorter.
    SummaryCompressed,
}

/// What one compaction did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionReport {
    pub mode: CompactionMode,
    pub messages_removed: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
}

#[derive(Debug, Clone)]
struct LiveSummary {
    text: String,
    message: Message,
    tokens: usize,
}

pub struct SummarizingMemory {
    task_id: TaskId,
    client: Arc<dyn LlmClient>,
    model: String,
    counter: Arc<dyn TokenCounter>,
    budget: usize,
    reserve_ratio: f64,
    artifact: SummaryArtifact,
    store: MessageStore,
    summary: Option<LiveSummary>,
}

impl SummarizingMemory {
    /// Create a summarizing memory for one task.
    ///
    /// `model` is the summarization model; its max context becomes the
    /// budget. A summary left by an earlier run of the same task is loaded.
    pub fn new(
        task_id: TaskId,
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        reserve_ratio: f64,
        workspace: &Path,
    ) -> Result<Self, MemoryError> {
        if !(reserve_ratio > 0.0 && reserve_ratio < 1.0) {
            return Err(MemoryError::InvalidConfig(format!(
                "reserve_ratio must be in (0, 1), got {reserve_ratio}"
            )));
        }
        let model = model.into();
        let budget = client.max_context(&model).unwrap_or(DEFAULT_MAX_CONTEXT);
        let counter = client.token_counter(&model);
        let artifact = SummaryArtifact::new(workspace, &task_id);

        let mut memory = Self {
            task_id,
            client,
            model,
            counter,
            budget,
            reserve_ratio,
            artifact,
            store: MessageStore::new(),
            summary: None,
        };
        if let Some(text) = memory.artifact.load()? {
            debug!(task_id = %memory.task_id, "Loaded existing summary");
            memory.summary = Some(memory.live_summary(text));
        }
        Ok(memory)
    }

    /// Override the context budget taken from the client.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn add(&mut self, message: Message) -> Result<(), MemoryError> {
        let tokens = self.counter.count_message(&message);
        self.store.push(message, tokens)
    }

    /// Pinned system prompt, then the summary, then the live history.
    pub fn messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.store.len() + 2);
        out.extend(self.store.pinned().cloned());
        out.extend(self.summary.as_ref().map(|s| s.message.clone()));
        out.extend(self.store.body().iter().cloned());
        out
    }

    pub fn clear(&mut self) -> Result<(), MemoryError> {
        self.store.clear();
        self.summary = None;
        self.artifact.remove()
    }

    pub fn token_count(&self) -> usize {
        self.store.pinned_tokens()
            + self.summary.as_ref().map_or(0, |s| s.tokens)
            + self.store.body_tokens()
    }

    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_ref().map(|s| s.text.as_str())
    }

    pub fn artifact(&self) -> &SummaryArtifact {
        &self.artifact
    }

    fn reserve_tokens(&self) -> usize {
        (self.budget as f64 * self.reserve_ratio) as usize
    }

    fn summary_budget(&self) -> usize {
        self.budget - self.reserve_tokens()
    }

    /// Tokens the next call would send: history plus tool descriptors.
    pub fn projected_tokens(&self, tools: &[ToolDescriptor]) -> usize {
        self.token_count() + self.counter.count_tools(tools)
    }

    fn live_summary(&self, text: String) -> LiveSummary {
        let message = Message::system(format!("{SUMMARY_HEADER}\n{text}"));
        let tokens = self.counter.count_message(&message);
        LiveSummary {
            text,
            message,
            tokens,
        }
    }

    /// Tokens the summary message costs now, or its header alone when there
    /// is no summary yet.
    fn summary_tokens(&self) -> usize {
        match &self.summary {
            Some(s) => s.tokens,
            None => self.counter.count_message(&Message::system(SUMMARY_HEADER)),
        }
    }

    /// Room for the kept tail: the reserve, capped by what the pinned prompt,
    /// the tool descriptors and a summary of `summary_tokens` leave over.
    fn tail_limit(&self, tool_tokens: usize, summary_tokens: usize) -> usize {
        let fixed = self.store.pinned_tokens() + tool_tokens + summary_tokens;
        self.reserve_tokens().min(self.budget.saturating_sub(fixed))
    }

    /// Body index where the kept tail starts.
    ///
    /// Whole units are taken from the end while they fit in `limit`; the
    /// newest unit is always kept.
    fn split_point(&self, limit: usize) -> usize {
        let units = self.store.units();
        let mut kept = 0;
        let mut start = self.store.len();
        for (i, unit) in units.iter().enumerate().rev() {
            let tokens = self.store.unit_tokens(unit);
            if i + 1 < units.len() && kept + tokens > limit {
                break;
            }
            kept += tokens;
            start = unit.start;
        }
        start
    }

    fn tail_tokens(&self, split: usize) -> usize {
        self.store.unit_tokens(&(split..self.store.len()))
    }

    /// Compact if the next call (with `tools`) would exceed the budget.
    ///
    /// Returns `Ok(None)` when nothing had to be done, and
    /// [`MemoryError::Overflow`] when the history cannot be brought under
    /// budget. State is only changed once the compacted history is known to
    /// fit.
    pub async fn compact(
        &mut self,
        tools: &[ToolDescriptor],
    ) -> Result<Option<CompactionReport>, MemoryError> {
        let tokens_before = self.projected_tokens(tools);
        if tokens_before <= self.budget {
            return Ok(None);
        }
        let tool_tokens = self.counter.count_tools(tools);

        let mut split = self.split_point(self.tail_limit(tool_tokens, self.summary_tokens()));
        let (mode, next) = if split > 0 {
            match self.fold(split).await {
                Ok(mut summary) => {
                    let wider = self.split_point(self.tail_limit(tool_tokens, summary.tokens));
                    if wider > split {
                        debug!(
                            task_id = %self.task_id,
                            from = split,
                            to = wider,
                            "Summary leaves too little room, folding more history"
                        );
                        match self.fold(wider).await {
                            Ok(refolded) => summary = refolded,
                            Err(e) => warn!(
                                task_id = %self.task_id,
                                error = %e,
                                dropped = wider - split,
                                "Summarization failed, truncating the extra span"
                            ),
                        }
                        split = wider;
                    }
                    (CompactionMode::Summarized, Some(summary))
                }
                Err(e) => {
                    warn!(
                        task_id = %self.task_id,
                        error = %e,
                        dropped = split,
                        "Summarization failed, truncating history instead"
                    );
                    (CompactionMode::Truncated, None)
                }
            }
        } else if let Some(prev) = self
            .summary
            .as_ref()
            .filter(|s| self.counter.count_text(&s.text) > self.summary_budget())
        {
            let text = self.compress(&prev.text).await.map_err(|e| {
                warn!(task_id = %self.task_id, error = %e, "Summary compression failed");
                MemoryError::Overflow {
                    required: tokens_before,
                    budget: self.budget,
                }
            })?;
            (CompactionMode::SummaryCompressed, Some(self.live_summary(text)))
        } else {
            return Err(MemoryError::Overflow {
                required: tokens_before,
                budget: self.budget,
            });
        };

        let summary_after = match (&next, &self.summary) {
            (Some(s), _) | (None, Some(s)) => s.tokens,
            (None, None) => 0,
        };
        let tokens_after =
            self.store.pinned_tokens() + summary_after + self.tail_tokens(split) + tool_tokens;
        if tokens_after > self.budget {
            return Err(MemoryError::Overflow {
                required: tokens_after,
                budget: self.budget,
            });
        }

        if let Some(summary) = next {
            self.artifact.save(&summary.text)?;
            self.summary = Some(summary);
        }
        self.store.drain_front(split);

        info!(
            task_id = %self.task_id,
            ?mode,
            removed = split,
            tokens_before,
            tokens_after,
            "Memory compacted"
        );
        Ok(Some(CompactionReport {
            mode,
            messages_removed: split,
            tokens_before,
            tokens_after,
        }))
    }

    /// Summarize the first `split` body messages and merge the result into
    /// the carried summary.
    async fn fold(&self, split: usize) -> Result<LiveSummary, ProviderError> {
        let synthesis = self.summarize(&self.store.body()[..split]).await?;
        let merged = match &self.summary {
            Some(prev) => format!("{}{SUMMARY_SEPARATOR}{synthesis}", prev.text),
            None => synthesis.clone(),
        };
        let text = self.fit_summary(merged, synthesis).await;
        Ok(self.live_summary(text))
    }

    async fn summarize(&self, span: &[Message]) -> Result<String, ProviderError> {
        let previous = self.summary.as_ref().map(|s| s.text.as_str());
        let prompt = summary_prompt(previous, span);
        self.ask(prompt).await
    }

    async fn compress(&self, summary: &str) -> Result<String, ProviderError> {
        self.ask(compress_prompt(summary, self.summary_budget())).await
    }

    async fn ask(&self, prompt: String) -> Result<String, ProviderError> {
        let request = LlmRequest::new(&self.model, vec![Message::user(prompt)]);
        let response = self.client.complete(request).await?;
        Ok(render_summary(response.content.as_deref().unwrap_or_default()))
    }

    /// Shrink `merged` to the summary budget, falling back to the newest
    /// synthesis alone when the model cannot compress it.
    async fn fit_summary(&self, merged: String, newest: String) -> String {
        if self.counter.count_text(&merged) <= self.summary_budget() {
            return merged;
        }
        match self.compress(&merged).await {
            Ok(text) => text,
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "Summary compression failed, keeping newest block");
                newest
            }
        }
    }
}
