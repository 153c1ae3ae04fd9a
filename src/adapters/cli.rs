//! CLI adapter — renders agent runs in the terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::agent::AgentRuntime;
use crate::stream::stream_task;
use crate::ui;
use crate::Result;
use super::Channel;

/// CLI channel for terminal sessions.
pub struct CliChannel {
    runtime: Arc<AgentRuntime>,
    stopped: AtomicBool,
}

/// How a rendered run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub events: usize,
    pub failed: bool,
}

impl CliChannel {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self {
            runtime,
            stopped: AtomicBool::new(false),
        }
    }

    /// Run a single task, printing each event as it arrives.
    pub async fn run_once(&self, task: &str, reset: bool) -> RunOutcome {
        let mut events = stream_task(self.runtime.clone(), task.to_string(), reset);
        let mut outcome = RunOutcome { events: 0, failed: false };

        while let Some(event) = events.recv().await {
            ui::print_event(&event);
            outcome.events += 1;
            outcome.failed |= event.is_error();
        }

        debug!("Rendered {} events", outcome.events);
        outcome
    }

    /// Read tasks from stdin until EOF, `exit` or [`Channel::stop`].
    pub async fn run_interactive(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while !self.stopped.load(Ordering::SeqCst) {
            stdout.write_all(b"\n> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match input.to_lowercase().as_str() {
                "exit" | "quit" | "q" => {
                    println!("Goodbye! 👋");
                    break;
                }
                "reset" => {
                    self.runtime.reset().await;
                    ui::print_success("Conversation history reset");
                }
                _ => {
                    self.run_once(input, false).await;
                }
            }
        }

        Ok(())
    }
}

impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<()> {
        self.stopped.store(false, Ordering::SeqCst);
        self.run_interactive().await
    }

    async fn stop(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::FakeLlmClient;
    use crate::agent::Context;
    use crate::tools::ToolRunner;

    fn channel(client: FakeLlmClient) -> CliChannel {
        let runtime = AgentRuntime::new(Box::new(client), Context::with_tools(ToolRunner::new()), 3);
        CliChannel::new(Arc::new(runtime))
    }

    #[tokio::test]
    async fn test_run_once_renders_all_events() {
        let cli = channel(FakeLlmClient::new(vec!["All good"]));
        let outcome = cli.run_once("Status?", false).await;
        // step header, model output, footnote, separator, final answer
        assert_eq!(outcome, RunOutcome { events: 5, failed: false });
    }

    #[tokio::test]
    async fn test_run_once_reports_failure() {
        let cli = channel(FakeLlmClient::new(vec![]));
        let outcome = cli.run_once("Status?", false).await;
        assert!(outcome.failed);
        assert_eq!(outcome.events, 1);
    }

    #[tokio::test]
    async fn test_channel_name() {
        let cli = channel(FakeLlmClient::new(vec![]));
        assert_eq!(cli.name(), "cli");
        cli.stop().await.unwrap();
    }
}
