use std::sync::Arc;
use confab_core::tools::{AddTool, AnyTool, CurrentDateTool, MultiplyTool};

/// Tools the command line can hand to the model
#[derive(Debug, Clone, PartialEq)]
pub enum ToolName {
    Add,
    Multiply,
    CurrentDate,
}

impl ToolName {
    pub fn all() -> Vec<ToolName> {
        vec![ToolName::Add, ToolName::Multiply, ToolName::CurrentDate]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolName::Add => "add",
            ToolName::Multiply => "multiply",
            ToolName::CurrentDate => "current_date",
        }
    }

    pub fn parse(s: &str) -> Option<ToolName> {
        match s.to_lowercase().as_str() {
            "add" => Some(ToolName::Add),
            "multiply" => Some(ToolName::Multiply),
            "current_date" | "date" => Some(ToolName::CurrentDate),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub struct ToolConfig {
    pub tools: Vec<ToolName>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self { tools: ToolName::all() }
    }
}

impl ToolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the given tools
    pub fn with_tools(tools: Vec<ToolName>) -> Self {
        Self { tools }
    }

    pub fn remove_tools(mut self, tools_to_remove: Vec<ToolName>) -> Self {
        self.tools.retain(|tool| !tools_to_remove.contains(tool));
        self
    }

    pub fn build_toolbox(&self) -> Vec<Arc<dyn AnyTool>> {
        self.tools
            .iter()
            .map(|tool| -> Arc<dyn AnyTool> {
                match tool {
                    ToolName::Add => Arc::new(AddTool),
                    ToolName::Multiply => Arc::new(MultiplyTool),
                    ToolName::CurrentDate => Arc::new(CurrentDateTool),
                }
            })
            .collect()
    }
}

pub fn list_all_tools() {
    eprintln!("Available tools:");
    for tool in ToolName::all() {
        eprintln!("  {}", tool.name());
    }
}

pub fn parse_tools_list(tools_str: &str) -> Result<Vec<ToolName>, String> {
    tools_str
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| ToolName::parse(s).ok_or_else(|| format!("Unknown tool: {}", s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use confab_llm::ToolDescription;

    use super::*;

    #[test]
    fn test_parse_tools_list() {
        assert_eq!(parse_tools_list("add, date").unwrap(), vec![ToolName::Add, ToolName::CurrentDate]);
        assert_eq!(parse_tools_list("add,bash").unwrap_err(), "Unknown tool: bash");
    }

    #[test]
    fn test_remove_tools() {
        let config = ToolConfig::new().remove_tools(vec![ToolName::Multiply]);
        let names: Vec<&str> = config.build_toolbox().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["add", "current_date"]);
    }
}
