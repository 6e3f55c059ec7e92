//! Wire a [`ReactLoop`] from configuration.

use std::sync::Arc;
use std::time::Duration;

use thinkloop_config::{AppConfig, MemoryStrategy};
use thinkloop_core::error::MemoryError;
use thinkloop_core::message::TaskId;
use thinkloop_core::provider::LlmClient;
use thinkloop_core::tool::ToolRegistry;
use thinkloop_memory::{Memory, SlidingWindowMemory, SummarizingMemory};
use tracing::debug;

use crate::error::AgentError;
use crate::react::ReactLoop;

/// Build the memory for one task as configured.
///
/// The summarizing strategy budgets against the summary model's context and
/// resumes from any summary already stored for `task_id`.
pub fn build_memory(
    config: &AppConfig,
    client: Arc<dyn LlmClient>,
    task_id: &TaskId,
) -> Result<Memory, MemoryError> {
    let memory: Memory = match config.memory.strategy {
        MemoryStrategy::SlidingWindow => SlidingWindowMemory::new(
            config.memory.max_messages,
            config.memory.max_tokens,
            client.token_counter(&config.default_model),
        )
        .into(),
        MemoryStrategy::Summarizing => SummarizingMemory::new(
            task_id.clone(),
            client,
            config.summary_model(),
            config.memory.reserve_ratio,
            &config.workspace_dir(),
        )?
        .into(),
    };
    debug!(task_id = %task_id, strategy = memory.kind(), "Memory ready");
    Ok(memory)
}

impl ReactLoop {
    /// Build a loop for `task_id` with the configured model, memory,
    /// iteration budget, timeout and system prompt.
    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        task_id: &TaskId,
    ) -> Result<Self, AgentError> {
        let memory = build_memory(config, client.clone(), task_id)?;
        let mut agent = ReactLoop::new(client, config.default_model.clone(), memory, tools)
            .with_max_iterations(config.agent.max_iterations)?;
        if let Some(secs) = config.agent.call_timeout_secs {
            agent = agent.with_call_timeout(Duration::from_secs(secs));
        }
        if config.agent.system_prompt.trim().is_empty() {
            Ok(agent)
        } else {
            agent.with_system_prompt(config.agent.system_prompt.clone())
        }
    }
}
