//! UI message kinds

use serde::{Deserialize, Serialize};

use super::chat::{ChatMessage, MessageStatus};
use super::convert::{FOOTNOTE_PREFIX, SEPARATOR, TOOL_TITLE_PREFIX};

/// What the frontend should render a message as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    StepNumber,
    TokenInfo,
    Separator,
    ToolStart,
    ToolContent,
    ToolResult,
    ToolError,
    /// The run itself failed.
    Error,
}

/// Pick the kind of a message. Content rules take precedence over
/// metadata rules.
pub fn classify(message: &ChatMessage) -> MessageKind {
    if let Some(text) = message.text() {
        if text.starts_with("**Step") {
            return MessageKind::StepNumber;
        }
        if text.starts_with(FOOTNOTE_PREFIX) {
            return MessageKind::TokenInfo;
        }
        if text == SEPARATOR {
            return MessageKind::Separator;
        }
    }

    let title = message.title().unwrap_or_default();
    if title.contains("Error") {
        MessageKind::ToolError
    } else if message.status() == Some(MessageStatus::Done) {
        MessageKind::ToolResult
    } else if title.contains("Logs") {
        MessageKind::ToolContent
    } else if title.to_lowercase().contains("tool") {
        MessageKind::ToolStart
    } else {
        MessageKind::Text
    }
}

/// Tool name announced by a tool-call parent title.
pub fn tool_name(message: &ChatMessage) -> Option<String> {
    let title = message.title()?;
    Some(title.strip_prefix(TOOL_TITLE_PREFIX).unwrap_or(title).to_string())
}
