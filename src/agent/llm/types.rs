//! Wire types for the Gemini `generateContent` API.
//!
//! Only the fields the client reads are modelled; everything else in the
//! payload is ignored by serde.

use serde::Deserialize;
use serde_json::Value;

/// Top-level Gemini API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
    pub finish_reason: Option<String>,
}

/// Blocked or empty candidates come back without parts.
#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Text or function call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub text: Option<String>,
    pub function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<usize>,
    pub candidates_token_count: Option<usize>,
    pub total_token_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct GeminiErrorResponse {
    pub error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GeminiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_function_call_response() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"functionCall": {"name": "get_current_time", "args": {}}}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 812, "candidatesTokenCount": 9, "totalTokenCount": 821}
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        let call = parsed.candidates[0].content.parts[0].function_call.as_ref().unwrap();
        assert_eq!(call.name, "get_current_time");
        assert_eq!(parsed.usage_metadata.unwrap().prompt_token_count, Some(812));
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let raw = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.candidates.is_empty());
        assert_eq!(parsed.prompt_feedback.unwrap().block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_parse_error_envelope() {
        let raw = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let parsed: GeminiErrorResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.code, 400);
        assert_eq!(parsed.error.status, "INVALID_ARGUMENT");
    }
}
