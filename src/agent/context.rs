//! Context builder for agent prompts.
//!
//! - Manifesto cached at construction time
//! - History windowing (max N messages)

use std::path::Path;

use crate::config::Config;
use crate::tools::ToolRunner;

use super::message::Message;

/// Maximum history messages to include in prompt (prevents unbounded growth).
const MAX_HISTORY_MESSAGES: usize = 40;

/// Prompt context: the tool set plus the cached agency manifesto.
pub struct Context {
    pub tool_runner: ToolRunner,
    /// Cached manifesto content (loaded once at construction).
    cached_manifesto: String,
}

impl Context {
    /// Create a new context from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            tool_runner: ToolRunner::new_with_defaults(config),
            cached_manifesto: Self::load_manifesto(&config.manifesto_path()),
        }
    }

    /// Create a context around an explicit tool runner.
    pub fn with_tools(tool_runner: ToolRunner) -> Self {
        Self {
            tool_runner,
            cached_manifesto: String::new(),
        }
    }

    /// Create a test context with no tools.
    #[cfg(test)]
    pub fn test() -> Self {
        Self::with_tools(ToolRunner::new())
    }

    /// Build system prompt from identity, manifesto and tool guidance.
    pub fn build_system_prompt(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        parts.push(self.get_identity());

        if !self.cached_manifesto.is_empty() {
            parts.push(format!("# Agency Manifesto\n\n{}", self.cached_manifesto));
        }

        let tool_names = self.tool_runner.tool_names();
        if !tool_names.is_empty() {
            let list: Vec<String> = tool_names.iter().map(|n| format!("- `{}`", n)).collect();
            parts.push(format!("# Tools\n\n{}", list.join("\n")));
        }

        parts.join("\n\n---\n\n")
    }

    /// Build messages list for LLM call with history windowing.
    pub fn build_messages(&self, history: &[Message], current: &str) -> Vec<Message> {
        let windowed_history = if history.len() > MAX_HISTORY_MESSAGES {
            &history[history.len() - MAX_HISTORY_MESSAGES..]
        } else {
            history
        };

        let mut messages = Vec::with_capacity(windowed_history.len() + 2);
        messages.push(Message::system(self.build_system_prompt()));
        messages.extend(windowed_history.iter().cloned());
        messages.push(Message::user(current));

        messages
    }

    fn get_identity(&self) -> String {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M (%A)");

        format!(
            r#"# Agency

You are the manager of a small agency of assistants. Solve the task step by
step, calling tools when they help.

## Current Time
{}

## Rules
- Files the user uploaded are listed at the end of the task; read them with `inspect_file_as_text`.
- Look things up with `web_search`, then read promising pages with `web_fetch`.
- When the user asks for a spreadsheet, put the data in markdown tables and call `markdown_to_excel`.
- Finish every task by calling `final_answer` with the complete answer."#,
            now
        )
    }

    fn load_manifesto(path: &Path) -> String {
        match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::debug!("No manifesto at {:?}", path);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::Role;
    use tempfile::TempDir;

    #[test]
    fn test_context_build_system_prompt() {
        let ctx = Context::test();
        let prompt = ctx.build_system_prompt();
        assert!(prompt.starts_with("# Agency"));
        assert!(!prompt.contains("# Tools"));
    }

    #[test]
    fn test_manifesto_and_tools_in_prompt() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            workspace: tmp.path().to_path_buf(),
            ..Config::default()
        };
        std::fs::write(config.manifesto_path(), "Be kind to spreadsheets.").unwrap();

        let prompt = Context::new(&config).build_system_prompt();
        assert!(prompt.contains("# Agency Manifesto\n\nBe kind to spreadsheets."));
        assert!(prompt.contains("- `markdown_to_excel`"));
        assert!(prompt.contains("- `web_search`"));
    }

    #[test]
    fn test_context_build_messages() {
        let ctx = Context::test();
        let messages = ctx.build_messages(&[], "Hello");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "Hello");
    }

    #[test]
    fn test_history_windowing() {
        let ctx = Context::test();

        let history: Vec<Message> = (0..100)
            .map(|i| Message::user(format!("Message {}", i)))
            .collect();

        let messages = ctx.build_messages(&history, "Current");

        // system + MAX_HISTORY_MESSAGES + current
        assert_eq!(messages.len(), MAX_HISTORY_MESSAGES + 2);
        assert!(messages[messages.len() - 2].content.contains("99"));
    }
}
