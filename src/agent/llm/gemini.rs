//! Gemini LLM client implementation (API key authentication).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

use super::super::message::{Message, Role, ToolCallRequest};
use super::{GeminiErrorResponse, GeminiResponse, LlmClient, LlmResponse, Usage};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini API client using API key authentication.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiClient {
    /// Create a new Gemini client with API key.
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GEMINI_API_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Point the client at another endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| match m.role {
                Role::Tool => json!({
                    "role": "function",
                    "parts": [{
                        "functionResponse": {
                            "name": m.tool_name.as_deref().unwrap_or("unknown"),
                            "response": {"result": m.content}
                        }
                    }]
                }),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !m.content.is_empty() {
                        parts.push(json!({"text": m.content}));
                    }
                    for tc in m.tool_calls.iter().flatten() {
                        parts.push(json!({
                            "functionCall": {
                                "name": tc.name,
                                "args": tc.arguments
                            }
                        }));
                    }
                    json!({"role": "model", "parts": parts})
                }
                Role::User | Role::System => json!({
                    "role": "user",
                    "parts": [{"text": m.content}]
                }),
            })
            .collect()
    }

    fn get_system_instruction(&self, messages: &[Message]) -> Option<String> {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
    }

    fn convert_tools(&self, tools: &[ToolDefinition]) -> Option<Value> {
        if tools.is_empty() {
            return None;
        }

        let function_declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters
                })
            })
            .collect();

        Some(json!([{
            "functionDeclarations": function_declarations
        }]))
    }

    fn parse_response(&self, response: &GeminiResponse) -> Result<LlmResponse> {
        let candidate = response.candidates.first().ok_or_else(|| {
            let reason = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            Error::Llm(format!("Empty Gemini response: {reason}"))
        })?;

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for part in &candidate.content.parts {
            if let Some(ref text) = part.text {
                texts.push(text.as_str());
            }

            if let Some(ref fc) = part.function_call {
                tool_calls.push(ToolCallRequest::new(
                    format!("tc_{}", tool_calls.len()),
                    fc.name.clone(),
                    fc.args.clone(),
                ));
            }
        }

        let usage = response.usage_metadata.as_ref().map(|u| Usage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0),
            completion_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        });

        Ok(LlmResponse {
            content: (!texts.is_empty()).then(|| texts.concat()),
            tool_calls,
            finish_reason: candidate
                .finish_reason
                .clone()
                .unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse> {
        let contents = self.convert_messages(messages);
        let system_instruction = self.get_system_instruction(messages);

        let mut request = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": 8192
            }
        });

        if let Some(system) = system_instruction {
            request["systemInstruction"] = json!({
                "parts": [{"text": system}]
            });
        }

        if let Some(tool_config) = self.convert_tools(tools) {
            request["tools"] = tool_config;
        }

        debug!("Calling Gemini model {} with {} messages", self.model, messages.len());
        let response = self.client.post(self.build_url()).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            let detail = serde_json::from_str::<GeminiErrorResponse>(&error_text)
                .map(|e| format!("{} {}", e.error.status, e.error.message))
                .unwrap_or(error_text);
            return Err(Error::Llm(format!("Gemini API error ({status}): {detail}")));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        self.parse_response(&gemini_response)
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new("key", "gemini-2.0-flash")
    }

    #[test]
    fn test_build_url() {
        let url = client().with_base_url("http://localhost:9999").build_url();
        assert_eq!(url, "http://localhost:9999/gemini-2.0-flash:generateContent?key=key");
    }

    #[test]
    fn test_convert_messages_roles() {
        let call = ToolCallRequest::new("tc_0", "get_current_time", json!({}));
        let messages = vec![
            Message::system("be brief"),
            Message::user("what time is it?"),
            Message::assistant_with_tools("", vec![call.clone()]),
            Message::tool_result(&call, "12:00 PM"),
        ];

        let converted = client().convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0]["role"], "user");
        assert_eq!(converted[1]["role"], "model");
        assert_eq!(converted[1]["parts"][0]["functionCall"]["name"], "get_current_time");
        assert_eq!(converted[2]["parts"][0]["functionResponse"]["name"], "get_current_time");
        assert_eq!(
            client().get_system_instruction(&messages).as_deref(),
            Some("be brief")
        );
    }

    #[test]
    fn test_parse_response_text_and_calls() {
        let raw: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Thought: I need the time."},
                    {"functionCall": {"name": "get_current_time", "args": {}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 100, "candidatesTokenCount": 12, "totalTokenCount": 112}
        }))
        .unwrap();

        let parsed = client().parse_response(&raw).unwrap();
        assert_eq!(parsed.content.as_deref(), Some("Thought: I need the time."));
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].id, "tc_0");
        assert_eq!(parsed.usage.unwrap().completion_tokens, 12);
    }

    #[test]
    fn test_parse_response_without_candidates() {
        let raw: GeminiResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        let err = client().parse_response(&raw).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
