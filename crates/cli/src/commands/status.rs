//! `thinkloop status` — Show the effective configuration.

use std::path::Path;

use thinkloop_config::{AppConfig, MemoryStrategy};

pub fn run(config: &AppConfig, config_path: Option<&Path>) {
    let default_path = AppConfig::config_dir().join("config.toml");
    let path = config_path.unwrap_or(&default_path);

    println!("thinkloop status");
    println!("================");
    println!("  Config file:    {}", path.display());
    println!("  Model:          {}", config.default_model);
    println!("  Summary model:  {}", config.summary_model());
    println!("  Max iterations: {}", config.agent.max_iterations);
    match config.agent.call_timeout_secs {
        Some(secs) => println!("  Call timeout:   {secs}s"),
        None => println!("  Call timeout:   none"),
    }
    match config.memory.strategy {
        MemoryStrategy::SlidingWindow => println!(
            "  Memory:         sliding window ({} messages, {} tokens)",
            config.memory.max_messages, config.memory.max_tokens
        ),
        MemoryStrategy::Summarizing => println!(
            "  Memory:         summarizing (reserve {:.0}%, workspace {})",
            config.memory.reserve_ratio * 100.0,
            config.workspace_dir().display()
        ),
    }
    println!(
        "  API key:        {}",
        if config.api_key.is_some() { "set" } else { "not set" }
    );

    if path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, using defaults");
    }
}
