//! Wire events sent to the frontend

use serde::{Deserialize, Serialize};

use crate::Result;
use super::classify::MessageKind;

/// One streamed message, serialized as a single JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Text, or the file path when `content_type` is a MIME type.
    pub content: String,

    /// `text` or a MIME type. Absent on error events.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Running totals for the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
}

impl StreamEvent {
    pub fn text(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            content_type: "text".to_string(),
            tool_name: None,
            input_tokens: None,
            output_tokens: None,
        }
    }

    /// Terminal event for a failed run.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content_type: String::new(),
            ..Self::text(MessageKind::Error, message)
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// NDJSON line: the JSON object followed by `\n`.
    pub fn to_line(&self) -> Result<String> {
        let mut line = self.to_json()?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_line() {
        let event = StreamEvent::text(MessageKind::StepNumber, "**Step 1**");
        assert_eq!(
            event.to_line().unwrap(),
            "{\"type\":\"step_number\",\"content\":\"**Step 1**\",\"content_type\":\"text\"}\n"
        );
    }

    #[test]
    fn test_error_shape() {
        let event = StreamEvent::error("quota exceeded");
        assert!(event.is_error());
        assert_eq!(event.to_json().unwrap(), r#"{"type":"error","content":"quota exceeded"}"#);
    }

    #[test]
    fn test_optional_fields() {
        let event = StreamEvent {
            tool_name: Some("get_current_time".into()),
            input_tokens: Some(1500),
            output_tokens: Some(20),
            ..StreamEvent::text(MessageKind::ToolStart, "{}")
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "tool_start");
        assert_eq!(value["tool_name"], "get_current_time");
        assert_eq!(value["input_tokens"], 1500);
        assert_eq!(value["output_tokens"], 20);

        let back: StreamEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
