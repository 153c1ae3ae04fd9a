//! Tool runner - manages and executes tools

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::Result;
use crate::config::Config;
use crate::error::Error;
use super::Tool;
use super::final_answer::FinalAnswerTool;
use super::inspect::InspectFileTool;
use super::tables::MarkdownExcelTool;
use super::time::CurrentTimeTool;
use super::web::{WebFetchTool, WebSearchTool};

/// Tool definition for LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tool runner manages registered tools and executes them
pub struct ToolRunner {
    // Ordered so tool declarations sent to the model are stable between calls
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRunner {
    /// Create an empty tool runner
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Create a tool runner with the agency's tools
    pub fn new_with_defaults(config: &Config) -> Self {
        let mut runner = Self::new();

        runner.register(CurrentTimeTool);
        runner.register(InspectFileTool::new(config.text_limit));
        runner.register(MarkdownExcelTool::new(config.output_dir.clone()));
        runner.register(WebSearchTool::new());
        runner.register(WebFetchTool::new());
        runner.register(FinalAnswerTool);

        runner
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// Get tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values()
            .map(|t| t.to_definition())
            .collect()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, params: Value) -> Result<String> {
        let tool = self.tools.get(name)
            .ok_or_else(|| Error::Tool(format!("Unknown tool: {}", name)))?;

        tool.execute(params).await
    }

    /// Check if a tool exists
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List registered tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::DummyTool;

    #[tokio::test]
    async fn test_tool_runner_register_and_execute() {
        let mut runner = ToolRunner::new();
        runner.register(DummyTool {
            name: "test_tool".to_string(),
            result: Ok("success".to_string()),
        });

        assert!(runner.has("test_tool"));

        let result = runner.execute("test_tool", serde_json::json!({})).await.unwrap();
        assert_eq!(result, "success");
    }

    #[tokio::test]
    async fn test_tool_runner_unknown_tool() {
        let runner = ToolRunner::new();
        let result = runner.execute("unknown", serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_default_tools_are_sorted() {
        let runner = ToolRunner::new_with_defaults(&Config::default());
        assert_eq!(
            runner.tool_names(),
            vec![
                "final_answer",
                "get_current_time",
                "inspect_file_as_text",
                "markdown_to_excel",
                "web_fetch",
                "web_search",
            ]
        );
        assert_eq!(runner.definitions().len(), 6);
    }
}
