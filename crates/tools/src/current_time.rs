//! Current date and time, optionally shifted to a fixed UTC offset.

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use thinkloop_core::error::ToolError;
use thinkloop_core::tool::{ParameterType, ToolArguments, ToolDescriptor, ToolHandler};

pub const NAME: &str = "current_time";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::function(NAME, "Get the current date and time in RFC 3339 format.").param(
        "utc_offset_hours",
        ParameterType::Integer,
        "Offset from UTC in whole hours, between -12 and 14 (default 0)",
        false,
    )
}

pub struct CurrentTime;

#[async_trait]
impl ToolHandler for CurrentTime {
    async fn call(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        let hours = arguments
            .get("utc_offset_hours")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        let offset = offset_for(hours).ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: format!("utc_offset_hours must be between -12 and 14, got {hours}"),
        })?;
        Ok(Utc::now().with_timezone(&offset).to_rfc3339())
    }
}

fn offset_for(hours: i64) -> Option<FixedOffset> {
    if !(-12..=14).contains(&hours) {
        return None;
    }
    FixedOffset::east_opt(i32::try_from(hours * 3600).ok()?)
}
