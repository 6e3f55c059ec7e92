//! `thinkloop run` — Run one task through the ReAct loop.

use std::sync::Arc;

use thinkloop_agent::{CancelReason, ReactLoop, RunOutcome};
use thinkloop_config::AppConfig;
use thinkloop_core::message::TaskId;
use thinkloop_core::provider::LlmClient;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(
    config: &AppConfig,
    message: String,
    task_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Check for API key early — give a clear error
    let model = config.model(&config.default_model);
    if config.api_key.is_none() && model.api_key.is_none() && model.base_url.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    THINKLOOP_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let client: Arc<dyn LlmClient> = Arc::new(thinkloop_providers::build_from_config(config)?);
    let tools = Arc::new(thinkloop_tools::default_registry()?);
    if let Some(id) = &task_id
        && (id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']))
    {
        return Err(format!("Invalid task id '{id}': must be a single path component").into());
    }
    let task_id = task_id.map(TaskId).unwrap_or_default();

    let mut agent = ReactLoop::from_config(config, client, tools, &task_id)?;
    info!(task_id = %task_id, model = %config.default_model, "Task started");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let outcome = agent.run(&message, &cancel).await?;
    report(&task_id, &outcome);
    Ok(())
}

fn report(task_id: &TaskId, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Done { answer, .. } => println!("{answer}"),
        RunOutcome::BudgetExhausted { stats } => eprintln!(
            "  Stopped after {} tool rounds without a final answer.",
            stats.iterations
        ),
        RunOutcome::Cancelled {
            reason: CancelReason::Signal,
            ..
        } => eprintln!("  Cancelled."),
        RunOutcome::Cancelled {
            reason: CancelReason::Timeout,
            ..
        } => eprintln!("  Model call timed out."),
    }

    let stats = outcome.stats();
    eprintln!(
        "  [task {task_id}] {} model calls, {} tool rounds, {} tokens, ${:.4}",
        stats.model_calls,
        stats.iterations,
        stats.usage.total_tokens(),
        stats.usage.cost
    );
}
