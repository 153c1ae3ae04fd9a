//! Step records emitted by the agent runtime.
//!
//! A run is an ordered sequence of [`Step`]s: the task, zero or more
//! planning and action steps, and finally the answer. Consumers such as the
//! stream adapter only ever look at these records, never at the runtime.

use serde::{Deserialize, Serialize};

use super::message::ToolCallRequest;

/// One model call plus whatever tools it triggered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub step_number: Option<usize>,

    /// Raw model text (thoughts, code) for this step.
    pub model_output: Option<String>,

    pub tool_calls: Option<Vec<ToolCallRequest>>,

    /// Tool output collected while executing the calls.
    pub observations: Option<String>,

    pub error: Option<String>,

    pub input_token_count: Option<u64>,
    pub output_token_count: Option<u64>,

    /// Wall-clock seconds spent in the step.
    pub duration: Option<f64>,
}

impl ActionStep {
    pub fn new(step_number: usize) -> Self {
        Self {
            step_number: Some(step_number),
            ..Self::default()
        }
    }

    /// Tool calls, treating an empty list like no list.
    pub fn calls(&self) -> Option<&[ToolCallRequest]> {
        self.tool_calls.as_deref().filter(|calls| !calls.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    pub task: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningStep {
    pub plan: String,
    pub input_token_count: Option<u64>,
    pub output_token_count: Option<u64>,
}

/// Typed final answer of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AgentOutput {
    Text(String),
    Image { path: String },
    Audio { path: String },
    Other(serde_json::Value),
}

impl AgentOutput {
    /// Classify a raw `final_answer` argument.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => AgentOutput::Text(text),
            other => AgentOutput::Other(other),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            AgentOutput::Text(text) => text.clone(),
            AgentOutput::Image { path } | AgentOutput::Audio { path } => path.clone(),
            AgentOutput::Other(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Task(TaskStep),
    Planning(PlanningStep),
    Action(ActionStep),
    FinalAnswer(AgentOutput),
}
