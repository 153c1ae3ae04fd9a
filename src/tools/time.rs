//! Clock tool

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use crate::Result;
use super::Tool;

/// Current UTC time, date and weekday
pub struct CurrentTimeTool;

impl CurrentTimeTool {
    fn format(now: DateTime<Utc>) -> String {
        format!(
            "Current Time (UTC): {}\nDate: {}\nDay: {}",
            now.format("%I:%M %p"),
            now.format("%Y-%m-%d"),
            now.format("%A"),
        )
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str { "get_current_time" }
    fn description(&self) -> &str {
        "Returns the current time in UTC, including the date and the day of the week"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value) -> Result<String> {
        Ok(Self::format(Utc::now()))
    }
}
