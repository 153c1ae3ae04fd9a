//! Tools module - agent capabilities
//!
//! Tools are the actions the agent can take: reading the clock, searching
//! and reading the web, inspecting uploaded files, exporting markdown tables
//! to Excel, and handing back the final answer.

mod runner;
mod final_answer;
mod inspect;
mod tables;
mod time;
mod web;

pub use runner::{ToolRunner, ToolDefinition};
pub use final_answer::{FinalAnswerTool, FINAL_ANSWER_TOOL};
pub use inspect::InspectFileTool;
pub use tables::{MarkdownExcelTool, CONVERSION_MARKER};
pub use time::CurrentTimeTool;
pub use web::{WebFetchTool, WebSearchTool};

use async_trait::async_trait;
use serde_json::Value;
use crate::Result;

/// Tool trait - interface for all agent tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name used in function calls
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters(&self) -> Value;

    /// Execute the tool with given parameters
    async fn execute(&self, params: Value) -> Result<String>;

    /// Convert to tool definition for LLM
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Read a required string parameter.
pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| crate::error::Error::Tool(format!("Missing '{}' parameter", key)))
}

/// Dummy tool for testing
#[cfg(test)]
pub struct DummyTool {
    pub name: String,
    pub result: std::result::Result<String, String>,
}

#[cfg(test)]
#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str { &self.name }
    fn description(&self) -> &str { "Dummy tool for testing" }
    fn parameters(&self) -> Value { serde_json::json!({"type": "object"}) }

    async fn execute(&self, _params: Value) -> Result<String> {
        self.result.clone().map_err(crate::error::Error::Tool)
    }
}
