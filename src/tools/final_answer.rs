//! Final answer tool - ends the run

use async_trait::async_trait;
use serde_json::{json, Value};
use crate::Result;
use super::Tool;

pub const FINAL_ANSWER_TOOL: &str = "final_answer";

/// The runtime intercepts calls to this tool; executing it just echoes the answer.
pub struct FinalAnswerTool;

#[async_trait]
impl Tool for FinalAnswerTool {
    fn name(&self) -> &str { FINAL_ANSWER_TOOL }
    fn description(&self) -> &str { "Provides a final answer to the given problem" }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "The final answer to the problem"
                }
            },
            "required": ["answer"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        Ok(match params.get("answer") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => params.to_string(),
        })
    }
}
