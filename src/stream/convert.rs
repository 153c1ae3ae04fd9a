//! Step records to chat messages.

use std::path::Path;
use std::sync::OnceLock;

use html_escape::{encode_double_quoted_attribute, encode_text};
use regex::Regex;
use serde_json::Value;

use crate::agent::step::{ActionStep, AgentOutput, Step};
use crate::agent::tokens::format_count;
use crate::agent::ToolCallRequest;
use crate::files::human_size;
use crate::tools::CONVERSION_MARKER;
use super::chat::{ChatMessage, MessageMetadata, MessageStatus};

/// Opening tag of the per-step footnote.
pub const FOOTNOTE_PREFIX: &str = r#"<span style="color: #bbbbc2; font-size: 12px;">"#;
pub const SEPARATOR: &str = "-----";
pub const TOOL_TITLE_PREFIX: &str = "🛠️ Used tool ";
pub const LOGS_TITLE: &str = "📝 Execution Logs";
pub const ERROR_TITLE: &str = "💥 Error";
pub const COMPLETED_TITLE: &str = "✅ Completed";

const CODE_TOOL: &str = "python_interpreter";

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("valid regex"))
        }
    };
}

static_regex!(fence_end_code, r"```\s*<end_code>");
static_regex!(end_code_fence, r"<end_code>\s*```");
static_regex!(fence_newline_end_code, r"```\s*\n\s*<end_code>");
static_regex!(fence_opener, r"```.*?\n");
static_regex!(end_code_tag, r"\s*<end_code>\s*");
static_regex!(logs_prefix, r"^Execution logs:\s*");

/// Parent ids of tool calls and whether each is still running.
#[derive(Debug, Default, Clone)]
pub struct ToolCallTracker {
    next: usize,
    calls: Vec<(String, MessageStatus)>,
}

impl ToolCallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh parent id in the pending state.
    pub fn open(&mut self) -> String {
        let id = format!("call_{}", self.next);
        self.next += 1;
        self.calls.push((id.clone(), MessageStatus::Pending));
        id
    }

    pub fn close(&mut self, id: &str) {
        if let Some((_, status)) = self.calls.iter_mut().find(|(call, _)| call == id) {
            *status = MessageStatus::Done;
        }
    }

    pub fn status(&self, id: &str) -> Option<MessageStatus> {
        self.calls.iter().find(|(call, _)| call == id).map(|(_, status)| *status)
    }

    /// Ids of calls that have not finished yet.
    pub fn pending(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|(_, status)| *status == MessageStatus::Pending)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Chat messages for one step. Only action steps and the final answer
/// produce output.
pub fn messages_for_step(step: &Step, tracker: &mut ToolCallTracker) -> Vec<ChatMessage> {
    match step {
        Step::Action(action) => action_messages(action, tracker),
        Step::FinalAnswer(output) => vec![final_answer_message(output)],
        Step::Task(_) | Step::Planning(_) => Vec::new(),
    }
}

fn action_messages(step: &ActionStep, tracker: &mut ToolCallTracker) -> Vec<ChatMessage> {
    let label = step.step_number.map(|n| format!("Step {}", n)).unwrap_or_default();
    let mut messages = vec![ChatMessage::assistant(format!("**{}**", label))];

    if let Some(output) = &step.model_output {
        messages.push(ChatMessage::assistant(clean_model_output(output)));
    }

    if let Some(calls) = step.calls() {
        tool_call_messages(step, &calls[0], tracker, &mut messages);
    } else if let Some(error) = &step.error {
        messages.push(ChatMessage::assistant(error.clone()).with_metadata(MessageMetadata::titled(ERROR_TITLE)));
    }

    messages.push(ChatMessage::assistant(footnote(&label, step)));
    messages.push(ChatMessage::assistant(SEPARATOR));
    messages
}

fn tool_call_messages(
    step: &ActionStep,
    call: &ToolCallRequest,
    tracker: &mut ToolCallTracker,
    messages: &mut Vec<ChatMessage>,
) {
    let parent_id = tracker.open();

    let mut content = call_content(&call.arguments);
    if call.name == CODE_TOOL {
        content = wrap_code(&content);
    }

    messages.push(
        ChatMessage::assistant(content).with_metadata(
            MessageMetadata::titled(format!("{}{}", TOOL_TITLE_PREFIX, call.name))
                .with_id(parent_id.clone())
                .with_status(MessageStatus::Pending),
        ),
    );

    let child = |title: &str| {
        MessageMetadata::titled(title)
            .with_parent(parent_id.clone())
            .with_status(MessageStatus::Done)
    };
    let mut children = 0;

    if let Some(observations) = step.observations.as_deref().filter(|o| !o.trim().is_empty()) {
        let logs = logs_prefix().replace(observations.trim(), "").into_owned();
        let logs = with_file_links(&logs).unwrap_or(logs);
        messages.push(ChatMessage::assistant(logs).with_metadata(child(LOGS_TITLE)));
        children += 1;
    }

    if let Some(error) = &step.error {
        messages.push(ChatMessage::assistant(error.clone()).with_metadata(child(ERROR_TITLE)));
        children += 1;
    }

    if children == 0 {
        messages.push(ChatMessage::assistant(format!("{} finished", call.name)).with_metadata(child(COMPLETED_TITLE)));
    }

    tracker.close(&parent_id);
}

fn clean_model_output(output: &str) -> String {
    let text = output.trim();
    let text = fence_end_code().replace_all(text, "```");
    let text = end_code_fence().replace_all(&text, "```");
    let text = fence_newline_end_code().replace_all(&text, "```");
    text.trim().to_string()
}

/// Text shown for a tool call: the `answer` argument when there is one.
fn call_content(arguments: &Value) -> String {
    match arguments {
        Value::Object(map) => match map.get("answer") {
            Some(Value::String(answer)) => answer.clone(),
            Some(other) => other.to_string(),
            None => arguments.to_string(),
        },
        Value::String(text) => text.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn wrap_code(content: &str) -> String {
    let code = fence_opener().replace_all(content, "");
    let code = end_code_tag().replace_all(&code, "");
    let code = code.trim();
    if code.starts_with("```python") {
        code.to_string()
    } else {
        format!("```python\n{}\n```", code)
    }
}

/// Replace a conversion report's path list with download links. `None`
/// when the logs are not a conversion report listing files.
fn with_file_links(logs: &str) -> Option<String> {
    if !logs.contains(CONVERSION_MARKER) {
        return None;
    }

    let mut lines = logs.lines();
    let base = lines.next()?;
    let paths: Vec<&str> = lines
        .map(str::trim)
        .filter(|l| l.ends_with(".xlsx") || l.ends_with(".csv"))
        .collect();
    if paths.is_empty() {
        return None;
    }

    let mut html = String::from(
        r#"<div class="generated-files"><div class="generated-files-title">Generated files:</div>"#,
    );
    for path in paths {
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        let size = std::fs::metadata(path)
            .map(|m| human_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        html.push_str(&format!(
            r#"<div class="generated-file"><span class="file-icon">📊</span><span class="file-name">{text}</span><span class="file-size">{size}</span><a href="/download?path={query}" download="{attr}" target="_blank">Download</a></div>"#,
            text = encode_text(&name),
            attr = encode_double_quoted_attribute(&name),
            query = urlencoding::encode(path),
        ));
    }
    html.push_str("</div>");

    Some(format!("{}{}", encode_text(base), html))
}

fn footnote(label: &str, step: &ActionStep) -> String {
    let mut note = label.to_string();
    if let (Some(input), Some(output)) = (step.input_token_count, step.output_token_count) {
        note.push_str(&format!(
            " | Input-tokens:{} | Output-tokens:{}",
            format_count(input),
            format_count(output)
        ));
    }
    if let Some(duration) = step.duration.filter(|d| *d != 0.0) {
        note.push_str(&format!(" | Duration: {}", format_duration(duration)));
    }
    format!("{}{}</span> ", FOOTNOTE_PREFIX, note)
}

/// Seconds rounded to two decimals, always with a fractional part.
///
/// Exact ties round to even, so `0.125` prints as `0.12`.
fn format_duration(seconds: f64) -> String {
    let fixed = format!("{:.2}", seconds);
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

fn final_answer_message(output: &AgentOutput) -> ChatMessage {
    match output {
        AgentOutput::Text(text) => ChatMessage::assistant(format!("**Final answer:**\n{}\n", text)),
        AgentOutput::Image { path } => ChatMessage::file(path.clone(), "image/png"),
        AgentOutput::Audio { path } => ChatMessage::file(path.clone(), "audio/wav"),
        AgentOutput::Other(value) => ChatMessage::assistant(format!("**Final answer:** {}", value)),
    }
}
