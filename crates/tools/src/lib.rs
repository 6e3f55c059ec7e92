//! Built-in tool implementations for thinkloop.
//!
//! Each tool module exposes its `NAME`, a `descriptor()` the model sees and
//! a [`ToolHandler`](thinkloop_core::tool::ToolHandler) that runs it.

pub mod current_time;
pub mod get_weather;

use std::sync::Arc;

use thinkloop_core::error::ToolError;
use thinkloop_core::tool::{ToolDescriptor, ToolHandler, ToolRegistry};
use tracing::debug;

/// Create the registry with every built-in tool.
///
/// Fails if two built-ins share a name, so a bad registry is caught at
/// startup instead of mid-run.
pub fn default_registry() -> Result<ToolRegistry, ToolError> {
    let builtins: [(ToolDescriptor, Arc<dyn ToolHandler>); 2] = [
        (get_weather::descriptor(), Arc::new(get_weather::GetWeather)),
        (current_time::descriptor(), Arc::new(current_time::CurrentTime)),
    ];
    let registry = ToolRegistry::from_entries(builtins)?;
    debug!(tools = ?registry.names(), "Built-in tools registered");
    Ok(registry)
}
