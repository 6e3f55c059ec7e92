//! Prompt templates and response parsing for conversation summaries.

use thinkloop_core::message::{Message, Role};

/// Longest excerpt of a single message quoted into a summary prompt.
const MAX_QUOTED_CHARS: usize = 500;

pub const SUMMARY_PROMPT: &str = r#"You are compressing the history of an ongoing agent task so it can continue within a limited context window.

{previous_summary}Conversation to summarize:
{conversation}

Respond with a single JSON object with exactly these keys:
- "task_context": what the user asked for and any constraints
- "key_decisions": decisions made so far (list of strings)
- "actions_taken": tools called and what they returned (list of strings)
- "current_state": where the task stands right now
- "important_info": facts, values and identifiers that must not be lost (list of strings)

Be concise. Do not invent information that is not in the conversation."#;

pub const COMPRESS_SUMMARY_PROMPT: &str = r#"The following task summary is too long. Rewrite it to fit in about {target_tokens} tokens while keeping every fact needed to continue the task.

{summary}

Respond with a single JSON object with the keys "task_context", "key_decisions", "actions_taken", "current_state" and "important_info"."#;

const SECTIONS: [(&str, &str); 5] = [
    ("task_context", "Task Context"),
    ("key_decisions", "Key Decisions"),
    ("actions_taken", "Actions Taken"),
    ("current_state", "Current State"),
    ("important_info", "Important Information"),
];

/// Fill [`SUMMARY_PROMPT`] for a span of messages.
pub fn summary_prompt(previous: Option<&str>, span: &[Message]) -> String {
    let previous = match previous {
        Some(text) => format!("Summary of earlier conversation:\n{text}\n\n"),
        None => String::new(),
    };
    SUMMARY_PROMPT
        .replace("{previous_summary}", &previous)
        .replace("{conversation}", &format_conversation(span))
}

/// Fill [`COMPRESS_SUMMARY_PROMPT`].
pub fn compress_prompt(summary: &str, target_tokens: usize) -> String {
    COMPRESS_SUMMARY_PROMPT
        .replace("{target_tokens}", &target_tokens.to_string())
        .replace("{summary}", summary)
}

/// Render messages as a plain transcript.
pub fn format_conversation(messages: &[Message]) -> String {
    let mut lines = Vec::with_capacity(messages.len());
    for m in messages {
        let role = m.role.as_str().to_uppercase();
        match m.role {
            Role::Tool => lines.push(format!(
                "[{role}] {} ({}): {}",
                m.name.as_deref().unwrap_or("tool"),
                m.tool_call_id.as_deref().unwrap_or("-"),
                excerpt(&m.content)
            )),
            _ => lines.push(format!("[{role}]: {}", excerpt(&m.content))),
        }
        for call in &m.tool_calls {
            lines.push(format!("  tool call {} -> {}({})", call.id, call.name, call.arguments));
        }
    }
    lines.join("\n")
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(MAX_QUOTED_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Turn the model's reply into the markdown summary block.
///
/// The reply should be a JSON object, possibly wrapped in prose or a code
/// fence. List values become bullet lists; missing keys render as "N/A".
/// A reply without parsable JSON is kept verbatim as the task context.
pub fn render_summary(raw: &str) -> String {
    let parsed = extract_json(raw);
    let mut out = String::new();
    for (i, (key, title)) in SECTIONS.iter().enumerate() {
        let body = match &parsed {
            Some(obj) => obj.get(*key).map(render_value).unwrap_or_else(|| "N/A".into()),
            None if i == 0 => excerpt(raw.trim()).to_string(),
            None => "N/A".into(),
        };
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("## {title}\n{body}\n"));
    }
    out
}

fn extract_json(raw: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&raw[start..=end]) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) if s.trim().is_empty() => "N/A".into(),
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Array(items) if items.is_empty() => "N/A".into(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => format!("- {s}"),
                other => format!("- {other}"),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Null => "N/A".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thinkloop_core::message::ToolCall;

    #[test]
    fn prompt_includes_previous_summary_and_span() {
        let span = vec![Message::user("find the weather"), Message::assistant("on it")];
        let prompt = summary_prompt(Some("## Task Context\nold"), &span);
        assert!(prompt.contains("Summary of earlier conversation:\n## Task Context\nold"));
        assert!(prompt.contains("[USER]: find the weather"));
        assert!(prompt.contains("[ASSISTANT]: on it"));
    }

    #[test]
    fn prompt_without_previous_summary() {
        let prompt = summary_prompt(None, &[Message::user("hi")]);
        assert!(!prompt.contains("Summary of earlier conversation"));
        assert!(!prompt.contains("{previous_summary}"));
    }

    #[test]
    fn transcript_shows_tool_calls_and_results() {
        let msgs = vec![
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new("c1", "get_weather", serde_json::json!({"location": "Kyiv"}))],
            ),
            Message::tool_result("c1", "get_weather", "snow"),
        ];
        let text = format_conversation(&msgs);
        assert!(text.contains("tool call c1 -> get_weather"));
        assert!(text.contains("[TOOL] get_weather (c1): snow"));
    }

    #[test]
    fn long_messages_are_truncated() {
        let text = format_conversation(&[Message::user("é".repeat(800))]);
        assert_eq!(text.chars().filter(|c| *c == 'é').count(), MAX_QUOTED_CHARS);
    }

    #[test]
    fn renders_json_reply() {
        let raw = r#"Here you go:
```json
{"task_context": "Plan a trip", "key_decisions": ["Go by train"], "actions_taken": [], "current_state": "Booking"}
```"#;
        let summary = render_summary(raw);
        assert!(summary.contains("## Task Context\nPlan a trip"));
        assert!(summary.contains("## Key Decisions\n- Go by train"));
        assert!(summary.contains("## Actions Taken\nN/A"));
        assert!(summary.contains("## Important Information\nN/A"));
    }

    #[test]
    fn non_json_reply_becomes_task_context() {
        let summary = render_summary("The user wants the weather in Oslo.");
        assert!(summary.starts_with("## Task Context\nThe user wants the weather in Oslo."));
        assert!(summary.contains("## Current State\nN/A"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let raw = r#"{"task_context": "x", "important_info": ["a", "b"]}"#;
        assert_eq!(render_summary(raw), render_summary(raw));
    }
}
