//! End-to-end integration tests for thinkloop.
//!
//! These tests drive the full pipeline from configuration to final answer:
//! memory construction, the built-in tools, the reasoning loop and, for the
//! summarizing strategy, the summary artifact stored on disk.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use thinkloop_agent::{CancelReason, ReactLoop, RunOutcome};
use thinkloop_config::{AppConfig, MemoryStrategy};
use thinkloop_core::error::ProviderError;
use thinkloop_core::message::{Role, TaskId, ToolCall};
use thinkloop_core::provider::{LlmClient, LlmRequest, LlmResponse, Usage};
use thinkloop_core::token::{HeuristicCounter, TokenCounter};
use thinkloop_tools::default_registry;
use tokio_util::sync::CancellationToken;

// ── Mock Client ──────────────────────────────────────────────────────────

/// Scripted agent replies; requests without tools are summarization calls.
struct ScriptedClient {
    replies: Mutex<VecDeque<LlmResponse>>,
    repeat: Option<LlmResponse>,
    agent_requests: Mutex<Vec<LlmRequest>>,
    summary_calls: Mutex<usize>,
    max_context: usize,
}

impl ScriptedClient {
    fn new(replies: Vec<LlmResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            repeat: None,
            agent_requests: Mutex::new(Vec::new()),
            summary_calls: Mutex::new(0),
            max_context: 600,
        }
    }

    fn repeating(reply: LlmResponse) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    fn agent_requests(&self) -> Vec<LlmRequest> {
        self.agent_requests.lock().unwrap().clone()
    }

    fn summary_calls(&self) -> usize {
        *self.summary_calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        if request.tools.is_empty() {
            *self.summary_calls.lock().unwrap() += 1;
            return Ok(LlmResponse::text(
                r#"{"task_context": "weather in Quito", "actions_taken": ["looked up Quito"]}"#,
            ));
        }
        self.agent_requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        match next.or_else(|| self.repeat.clone()) {
            Some(reply) => Ok(reply),
            None => panic!("ScriptedClient exhausted"),
        }
    }

    fn max_context(&self, _model: &str) -> Option<usize> {
        Some(self.max_context)
    }
}

fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        cost: 0.001,
    }
}

fn text(answer: &str) -> LlmResponse {
    LlmResponse {
        usage: usage(),
        ..LlmResponse::text(answer)
    }
}

fn weather(id: &str, location: &str) -> LlmResponse {
    LlmResponse {
        usage: usage(),
        ..LlmResponse::tool_calls(
            None,
            vec![ToolCall::new(id, "get_weather", serde_json::json!({ "location": location }))],
        )
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.default_model = "mock-model".into();
    config.agent.system_prompt = "You are a weather assistant.".into();
    config
}

fn summarizing_config(workspace: &std::path::Path) -> AppConfig {
    let mut config = config();
    config.memory.strategy = MemoryStrategy::Summarizing;
    config.memory.workspace = Some(workspace.to_path_buf());
    config
}

fn agent(config: &AppConfig, client: Arc<ScriptedClient>, task: &str) -> ReactLoop {
    let tools = Arc::new(default_registry().unwrap());
    ReactLoop::from_config(config, client, tools, &TaskId::from(task)).unwrap()
}

// ── Pipeline ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn weather_question_runs_tool_then_answers() {
    let client = Arc::new(ScriptedClient::new(vec![
        weather("call_1", "Quito"),
        text("It is mild in Quito."),
    ]));
    let mut agent = agent(&config(), client.clone(), "e2e-weather");

    let outcome = agent
        .run("What's the weather in Quito?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.answer(), Some("It is mild in Quito."));
    assert_eq!(outcome.stats().iterations, 1);
    assert_eq!(outcome.stats().model_calls, 2);
    assert_eq!(outcome.stats().usage.total_tokens(), 30);

    let requests = client.agent_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].model, "mock-model");
    assert_eq!(requests[0].tools.len(), 2);

    let second = &requests[1].messages;
    let result = second.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
    assert!(result.content.contains("Quito"));
    assert!(second.last().unwrap().role == Role::Tool);
}

#[tokio::test]
async fn configured_iteration_budget_stops_the_run() {
    let mut config = config();
    config.agent.max_iterations = 2;
    let client = Arc::new(ScriptedClient::repeating(weather("w", "Lima")));
    let mut agent = agent(&config, client.clone(), "e2e-budget");

    let outcome = agent.run("Keep checking", &CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::BudgetExhausted { .. }));
    assert_eq!(outcome.stats().iterations, 2);
    assert_eq!(client.agent_requests().len(), 2);
}

#[tokio::test]
async fn cancelled_token_stops_before_any_call() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let mut agent = agent(&config(), client.clone(), "e2e-cancel");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = agent.run("Hello", &cancel).await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Cancelled {
            reason: CancelReason::Signal,
            ..
        }
    ));
    assert!(client.agent_requests().is_empty());
}

// ── Summarizing memory ───────────────────────────────────────────────────

#[tokio::test]
async fn long_run_compacts_and_stays_in_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = summarizing_config(dir.path());
    config.agent.max_iterations = 12;
    let client = Arc::new(ScriptedClient::repeating(weather("w", "Quito")));
    let mut agent = agent(&config, client.clone(), "e2e-long");

    let outcome = agent.run("Keep checking Quito", &CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::BudgetExhausted { .. }));
    assert!(client.summary_calls() >= 1);

    let counter = HeuristicCounter;
    for request in client.agent_requests() {
        let tokens = counter.count_messages(&request.messages) + counter.count_tools(&request.tools);
        assert!(tokens <= 600, "request of {tokens} tokens over budget");
        assert_eq!(request.messages[0].content, "You are a weather assistant.");
    }

    let stored = std::fs::read_to_string(dir.path().join("e2e-long").join("summary.md")).unwrap();
    assert!(stored.contains("## Task Context\nweather in Quito"));
}

#[tokio::test]
async fn same_task_id_resumes_from_stored_summary() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = summarizing_config(dir.path());
    config.agent.max_iterations = 12;

    let first = Arc::new(ScriptedClient::repeating(weather("w", "Quito")));
    agent(&config, first.clone(), "e2e-resume")
        .run("Keep checking Quito", &CancellationToken::new())
        .await
        .unwrap();
    assert!(first.summary_calls() >= 1);

    let second = Arc::new(ScriptedClient::new(vec![text("Quito stayed mild.")]));
    let mut resumed = agent(&config, second.clone(), "e2e-resume");
    let outcome = resumed
        .run("What did we find?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.answer(), Some("Quito stayed mild."));
    let request = &second.agent_requests()[0];
    assert_eq!(request.messages[0].content, "You are a weather assistant.");
    assert_eq!(request.messages[1].role, Role::System);
    assert!(request.messages[1].content.starts_with("Previous conversation summary:"));
    assert!(request.messages[1].content.contains("weather in Quito"));
    assert_eq!(request.messages.last().unwrap().content, "What did we find?");
}

#[tokio::test]
async fn different_task_ids_do_not_share_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = summarizing_config(dir.path());
    config.agent.max_iterations = 12;

    let first = Arc::new(ScriptedClient::repeating(weather("w", "Quito")));
    agent(&config, first, "e2e-a")
        .run("Keep checking Quito", &CancellationToken::new())
        .await
        .unwrap();

    let other = agent(&config, Arc::new(ScriptedClient::new(vec![])), "e2e-b");
    let messages = other.memory().messages();
    assert_eq!(messages.len(), 1);
    assert!(!dir.path().join("e2e-b").join("summary.md").exists());
}
