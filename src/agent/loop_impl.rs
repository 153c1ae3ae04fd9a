//! Agent runtime - drives the model and tools, emitting step records

use std::time::Instant;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::tools::FINAL_ANSWER_TOOL;
use crate::Result;
use super::context::Context;
use super::llm::{LlmClient, LlmResponse, ProviderRegistry};
use super::message::{Message, ToolCallRequest};
use super::step::{ActionStep, AgentOutput, Step, TaskStep};

/// The agent runtime processes tasks through LLM and tool execution.
///
/// Every run reports its progress as [`Step`] records on a channel: the
/// task, one action step per model call, then the final answer. Completed
/// task/answer pairs are remembered for later runs until [`reset`] is
/// requested. Runs are serialized.
///
/// [`reset`]: AgentRuntime::reset
pub struct AgentRuntime {
    client: Box<dyn LlmClient>,
    ctx: Context,
    max_steps: usize,
    memory: Mutex<Vec<Message>>,
}

impl AgentRuntime {
    pub fn new(client: Box<dyn LlmClient>, ctx: Context, max_steps: usize) -> Self {
        Self {
            client,
            ctx,
            max_steps,
            memory: Mutex::new(Vec::new()),
        }
    }

    /// Build a runtime from configuration (provider, tools, manifesto).
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ProviderRegistry::create(config)?;
        Ok(Self::new(client, Context::new(config), config.max_steps))
    }

    /// Model used by this runtime.
    pub fn model(&self) -> &str {
        self.client.default_model()
    }

    /// Forget every remembered exchange.
    pub async fn reset(&self) {
        self.memory.lock().await.clear();
        info!("Agent memory reset");
    }

    /// Number of remembered messages.
    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    /// Run a task, sending step records to `steps` as they complete.
    ///
    /// A closed `steps` channel does not stop the run; the answer is still
    /// remembered.
    pub async fn run(&self, task: &str, reset: bool, steps: &mpsc::Sender<Step>) -> Result<AgentOutput> {
        let mut memory = self.memory.lock().await;
        if reset {
            memory.clear();
        }

        info!("Starting agent run: {}", task);
        emit(steps, Step::Task(TaskStep { task: task.to_string() })).await;

        let mut messages = self.ctx.build_messages(&memory, task);
        let tools = self.ctx.tool_runner.definitions();

        for step_number in 1..=self.max_steps {
            debug!("Step {}/{}", step_number, self.max_steps);
            let started = Instant::now();

            let response = self.client.chat(&messages, &tools).await?;
            let mut step = action_step(step_number, &response);

            let answer = if response.has_tool_calls() {
                messages.push(Message::assistant_with_tools(
                    response.content.clone().unwrap_or_default(),
                    response.tool_calls.clone(),
                ));
                self.execute_calls(&response.tool_calls, &mut step, &mut messages).await
            } else {
                let text = response.content.clone().unwrap_or_default();
                Some(AgentOutput::Text(text))
            };

            step.duration = Some(started.elapsed().as_secs_f64());
            emit(steps, Step::Action(step)).await;

            if let Some(answer) = answer {
                info!("Agent completed in {} steps", step_number);
                memory.push(Message::user(task));
                memory.push(Message::assistant(answer.as_text()));
                emit(steps, Step::FinalAnswer(answer.clone())).await;
                return Ok(answer);
            }
        }

        warn!("Agent hit the step limit ({})", self.max_steps);
        Err(Error::MaxIterations)
    }

    /// Execute the calls of one model turn. Returns the answer when the
    /// model called `final_answer`.
    async fn execute_calls(
        &self,
        calls: &[ToolCallRequest],
        step: &mut ActionStep,
        messages: &mut Vec<Message>,
    ) -> Option<AgentOutput> {
        let mut observations = Vec::new();
        let mut errors = Vec::new();
        let mut answer = None;

        for call in calls {
            if call.name == FINAL_ANSWER_TOOL {
                let value = match &call.arguments {
                    Value::Object(map) => map.get("answer").cloned().unwrap_or(Value::Null),
                    other => other.clone(),
                };
                let output = AgentOutput::from_value(value);
                observations.push(output.as_text());
                messages.push(Message::tool_result(call, output.as_text()));
                answer = Some(output);
                continue;
            }

            debug!("Executing tool: {} with args: {}", call.name, call.arguments);
            match self.ctx.tool_runner.execute(&call.name, call.arguments.clone()).await {
                Ok(result) => {
                    debug!("Tool {} succeeded: {} chars", call.name, result.len());
                    messages.push(Message::tool_result(call, result.clone()));
                    observations.push(result);
                }
                Err(e) => {
                    let error_msg = format!("Error executing tool '{}': {}", call.name, e);
                    debug!("{}", error_msg);
                    messages.push(Message::tool_result(call, format!("Error: {}", e)));
                    errors.push(error_msg);
                }
            }
        }

        if !observations.is_empty() {
            step.observations = Some(observations.join("\n"));
        }
        if !errors.is_empty() {
            step.error = Some(errors.join("\n"));
        }
        answer
    }
}

fn action_step(step_number: usize, response: &LlmResponse) -> ActionStep {
    let mut step = ActionStep::new(step_number);
    step.model_output = response.content.clone().filter(|c| !c.trim().is_empty());
    if response.has_tool_calls() {
        step.tool_calls = Some(response.tool_calls.clone());
    }
    if let Some(usage) = &response.usage {
        step.input_token_count = Some(usage.prompt_tokens as u64);
        step.output_token_count = Some(usage.completion_tokens as u64);
    }
    step
}

async fn emit(steps: &mpsc::Sender<Step>, step: Step) {
    if steps.send(step).await.is_err() {
        debug!("Step receiver dropped");
    }
}
