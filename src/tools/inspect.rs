//! File inspection tool - reads uploaded documents as text

use async_trait::async_trait;
use serde_json::{json, Value};
use crate::Result;
use crate::error::Error;
use super::{required_str, Tool};

/// Read a text file, truncated to a character limit
pub struct InspectFileTool {
    text_limit: usize,
}

impl InspectFileTool {
    pub fn new(text_limit: usize) -> Self {
        Self { text_limit }
    }
}

#[async_trait]
impl Tool for InspectFileTool {
    fn name(&self) -> &str { "inspect_file_as_text" }
    fn description(&self) -> &str {
        "Read a local file (for example one the user uploaded) as plain text"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to read"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = required_str(&params, "file_path")?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Tool(format!("Failed to read {}: {}", path, e)))?;
        let text = String::from_utf8_lossy(&bytes);

        let mut out: String = text.chars().take(self.text_limit).collect();
        if text.chars().count() > self.text_limit {
            out.push_str(&format!("\n\n[truncated to {} characters]", self.text_limit));
        }

        Ok(format!("Document content:\n{}", out))
    }
}
