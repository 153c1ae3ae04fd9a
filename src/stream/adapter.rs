//! Step-to-event accumulator for one agent run.

use std::fmt::Display;

use tracing::debug;

use crate::agent::step::Step;
use crate::agent::tokens::TokenTally;
use crate::tools::CONVERSION_MARKER;
use super::chat::{ChatMessage, MessageContent};
use super::classify::{classify, tool_name, MessageKind};
use super::convert::{messages_for_step, ToolCallTracker};
use super::events::StreamEvent;

const FILE_HINTS: [&str; 3] = [CONVERSION_MARKER, "file generated", "created file"];

/// Turns the step records of one run into chat messages and wire events.
///
/// The adapter keeps the run's token totals, allocates tool-call parent
/// ids, and remembers whether any message reported a generated file.
#[derive(Debug, Default)]
pub struct StreamAdapter {
    tally: TokenTally,
    tool_calls: ToolCallTracker,
    files_generated: bool,
}

impl StreamAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a step into the run state and return its chat messages.
    pub fn on_step(&mut self, step: &Step) -> Vec<ChatMessage> {
        match step {
            Step::Action(action) => self.tally.record(action.input_token_count, action.output_token_count),
            Step::Planning(plan) => self.tally.record(plan.input_token_count, plan.output_token_count),
            Step::Task(_) | Step::FinalAnswer(_) => {}
        }

        let messages = messages_for_step(step, &mut self.tool_calls);
        if !self.files_generated && messages.iter().any(mentions_generated_file) {
            debug!("Run generated files");
            self.files_generated = true;
        }
        messages
    }

    /// Wire event for a message. Empty messages produce nothing.
    pub fn event(&self, message: &ChatMessage) -> Option<StreamEvent> {
        if message.is_empty() {
            return None;
        }

        let kind = classify(message);
        let mut event = match &message.content {
            MessageContent::Text(text) => StreamEvent::text(kind, text.clone()),
            MessageContent::File { path, mime_type } => StreamEvent {
                content_type: mime_type.clone(),
                ..StreamEvent::text(kind, path.clone())
            },
        };

        if kind == MessageKind::ToolStart {
            event.tool_name = tool_name(message);
        }
        if let Some((input, output)) = self.tally.totals() {
            event.input_tokens = Some(input);
            event.output_tokens = Some(output);
        }
        Some(event)
    }

    /// `on_step` followed by `event` for each resulting message.
    pub fn events_for_step(&mut self, step: &Step) -> Vec<StreamEvent> {
        self.on_step(step)
            .iter()
            .filter_map(|message| self.event(message))
            .collect()
    }

    pub fn error_event(&self, message: impl Display) -> StreamEvent {
        StreamEvent::error(message.to_string())
    }

    /// Parent ids of tool calls still awaiting their output.
    pub fn pending_tool_calls(&self) -> Vec<&str> {
        self.tool_calls.pending()
    }

    pub fn tally(&self) -> TokenTally {
        self.tally
    }

    pub fn files_generated(&self) -> bool {
        self.files_generated
    }
}

fn mentions_generated_file(message: &ChatMessage) -> bool {
    message
        .text()
        .map(|text| FILE_HINTS.iter().any(|hint| text.contains(hint)))
        .unwrap_or(false)
}
