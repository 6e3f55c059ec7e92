//! ReAct loop — reason, act, observe, until the model answers.
//!
//! Each iteration sends the bounded history and the tool descriptors to the
//! model. A reply without tool calls ends the run; otherwise every requested
//! tool runs in order, its result is appended, and the loop goes around
//! again. One tool round counts as one iteration; reaching `max_iterations`
//! ends the run with [`RunOutcome::BudgetExhausted`].
//!
//! The model call (and the memory compaction that precedes it) is the only
//! place the loop waits on the outside world, so it is where cancellation
//! and the per-call timeout apply. Neither touches memory: the assistant
//! message is appended only after a call returns.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thinkloop_core::message::{Message, ToolCall};
use thinkloop_core::provider::{LlmClient, LlmRequest, LlmResponse, Usage};
use thinkloop_core::tool::{ToolDescriptor, ToolRegistry};
use thinkloop_memory::Memory;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AgentError;

/// Default tool rounds per run.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Where the loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingModel,
    HasToolCalls,
    Done,
    BudgetExhausted,
    Cancelled,
    Failed,
}

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The cancellation token fired.
    Signal,
    /// A model call took longer than the configured timeout.
    Timeout,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    /// Completed tool rounds.
    pub iterations: usize,
    /// Model calls that returned a response.
    pub model_calls: usize,
    /// Token usage and cost summed over those calls.
    pub usage: Usage,
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Done { answer: String, stats: RunStats },
    BudgetExhausted { stats: RunStats },
    Cancelled { reason: CancelReason, stats: RunStats },
}

impl RunOutcome {
    pub fn stats(&self) -> &RunStats {
        match self {
            RunOutcome::Done { stats, .. }
            | RunOutcome::BudgetExhausted { stats }
            | RunOutcome::Cancelled { stats, .. } => stats,
        }
    }

    /// The final answer, if the model gave one.
    pub fn answer(&self) -> Option<&str> {
        match self {
            RunOutcome::Done { answer, .. } => Some(answer),
            _ => None,
        }
    }
}

enum ModelStep {
    Response(LlmResponse),
    Cancelled(CancelReason),
}

/// A reasoning loop bound to one task's memory.
pub struct ReactLoop {
    client: Arc<dyn LlmClient>,
    model: String,
    memory: Memory,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    call_timeout: Option<Duration>,
    temperature: Option<f32>,
    state: LoopState,
}

impl ReactLoop {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        memory: Memory,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            memory,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            call_timeout: None,
            temperature: None,
            state: LoopState::Idle,
        }
    }

    /// Set max tool rounds per run. Must be at least one.
    pub fn with_max_iterations(mut self, max: usize) -> Result<Self, AgentError> {
        if max == 0 {
            return Err(AgentError::InvalidConfig(
                "max_iterations must be at least 1".into(),
            ));
        }
        self.max_iterations = max;
        Ok(self)
    }

    /// Give up on a model call after `timeout`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Pin a system prompt at the head of the history.
    ///
    /// Must be called before anything else is added to memory.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Result<Self, AgentError> {
        self.memory.add(Message::system(prompt))?;
        Ok(self)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Run the loop on a new user input until it answers, runs out of
    /// iterations, is cancelled, or fails.
    pub async fn run(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AgentError> {
        info!(model = %self.model, max_iter = self.max_iterations, memory = self.memory.kind(), "ReAct loop starting");

        let result = self.run_inner(input, cancel).await;
        self.state = match &result {
            Ok(RunOutcome::Done { .. }) => LoopState::Done,
            Ok(RunOutcome::BudgetExhausted { .. }) => LoopState::BudgetExhausted,
            Ok(RunOutcome::Cancelled { .. }) => LoopState::Cancelled,
            Err(_) => LoopState::Failed,
        };

        match &result {
            Ok(outcome) => info!(
                state = ?self.state,
                iterations = outcome.stats().iterations,
                model_calls = outcome.stats().model_calls,
                tokens = outcome.stats().usage.total_tokens(),
                cost = outcome.stats().usage.cost,
                "ReAct loop finished"
            ),
            Err(e) => warn!(error = %e, "ReAct loop failed"),
        }
        result
    }

    async fn run_inner(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AgentError> {
        self.memory.add(Message::user(input))?;
        let descriptors = self.tools.descriptors();
        let mut stats = RunStats::default();

        loop {
            self.state = LoopState::AwaitingModel;
            debug!(iteration = stats.iterations + 1, messages = self.memory.len(), "ReAct iteration");

            let mut response = match self.call_model(&descriptors, cancel).await? {
                ModelStep::Response(response) => response,
                ModelStep::Cancelled(reason) => {
                    info!(?reason, "Model call cancelled");
                    return Ok(RunOutcome::Cancelled { reason, stats });
                }
            };
            stats.model_calls += 1;
            stats.usage += response.usage;

            if response.tool_calls.is_empty() {
                let answer = response.content.unwrap_or_default();
                self.memory.add(Message::assistant(answer.clone()))?;
                return Ok(RunOutcome::Done { answer, stats });
            }

            self.state = LoopState::HasToolCalls;
            normalize_call_ids(&mut response.tool_calls);
            self.memory.add(response.to_message())?;

            for call in &response.tool_calls {
                debug!(tool = %call.name, call_id = %call.id, "Tool call");
                let result = self.tools.dispatch_call(call).await;
                debug!(tool = %call.name, is_error = result.is_error, "Tool result");
                self.memory
                    .add(Message::tool_result(&call.id, &call.name, result.output))?;
            }

            stats.iterations += 1;
            if stats.iterations >= self.max_iterations {
                warn!(max_iter = self.max_iterations, "ReAct: max iterations reached");
                return Ok(RunOutcome::BudgetExhausted { stats });
            }
        }
    }

    /// Compact memory, then ask the model, racing both against the token.
    async fn call_model(
        &mut self,
        tools: &[ToolDescriptor],
        cancel: &CancellationToken,
    ) -> Result<ModelStep, AgentError> {
        let memory = &mut self.memory;
        let client = &self.client;
        let model = self.model.as_str();
        let temperature = self.temperature;
        let call_timeout = self.call_timeout;

        let step = async move {
            if let Some(report) = memory.prepare(tools).await? {
                debug!(
                    mode = ?report.mode,
                    removed = report.messages_removed,
                    tokens_before = report.tokens_before,
                    tokens_after = report.tokens_after,
                    "Compacted memory before model call"
                );
            }

            let mut request = LlmRequest::new(model, memory.messages()).with_tools(tools.to_vec());
            request.temperature = temperature;

            let response = match call_timeout {
                Some(limit) => match tokio::time::timeout(limit, client.complete(request)).await {
                    Ok(response) => response?,
                    Err(_) => {
                        warn!(timeout_secs = limit.as_secs_f64(), "Model call timed out");
                        return Ok(ModelStep::Cancelled(CancelReason::Timeout));
                    }
                },
                None => client.complete(request).await?,
            };
            Ok::<_, AgentError>(ModelStep::Response(response))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(ModelStep::Cancelled(CancelReason::Signal)),
            step = step => step,
        }
    }
}

/// Give empty or repeated call ids a fresh id so every result pairs with
/// exactly one call.
fn normalize_call_ids(calls: &mut [ToolCall]) {
    let mut seen = HashSet::new();
    for call in calls {
        if call.id.is_empty() || !seen.insert(call.id.clone()) {
            call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
            seen.insert(call.id.clone());
        }
    }
}
