//! `thinkloop tools` — List the built-in tools.

use thinkloop_core::tool::{ToolDescriptor, ToolRegistry};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = thinkloop_tools::default_registry()?;
    print!("{}", render(&registry));
    Ok(())
}

fn render(registry: &ToolRegistry) -> String {
    let mut out = String::from("Built-in tools\n==============\n");
    for tool in registry.descriptors() {
        out.push_str(&render_tool(&tool));
    }
    out
}

fn render_tool(tool: &ToolDescriptor) -> String {
    let mut out = format!("\n  {}\n    {}\n", tool.name, tool.description);
    for (name, spec) in &tool.parameters {
        let required = if spec.required { "required" } else { "optional" };
        out.push_str(&format!(
            "    - {name} ({}, {required}): {}\n",
            spec.kind.as_str(),
            spec.description
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_builtin_with_parameters() {
        let registry = thinkloop_tools::default_registry().unwrap();
        let text = render(&registry);
        assert!(text.contains("get_weather"));
        assert!(text.contains("current_time"));
        assert!(text.contains("- location (string, required)"));
        assert!(text.contains("- units (string, optional)"));
    }
}
