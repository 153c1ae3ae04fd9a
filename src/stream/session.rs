//! Running a task and streaming its events.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::agent::step::AgentOutput;
use crate::agent::tokens::TokenTally;
use crate::agent::AgentRuntime;
use crate::Result;
use super::adapter::StreamAdapter;
use super::events::StreamEvent;

/// Buffer between the runtime, the adapter and the consumer.
pub const CHANNEL_CAPACITY: usize = 64;

/// Start a run in the background and return its event stream.
///
/// A failed run ends the stream with one error event. Dropping the receiver
/// stops forwarding; the run itself still completes.
pub fn stream_task(runtime: Arc<AgentRuntime>, task: String, reset: bool) -> mpsc::Receiver<StreamEvent> {
    let (step_tx, mut step_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let run = tokio::spawn(async move { runtime.run(&task, reset, &step_tx).await });

    tokio::spawn(async move {
        let mut adapter = StreamAdapter::new();

        while let Some(step) = step_rx.recv().await {
            for event in adapter.events_for_step(&step) {
                if event_tx.send(event).await.is_err() {
                    debug!("Event receiver dropped, stopping stream");
                    return;
                }
            }
        }

        let failure = match run.await {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(format!("Agent task aborted: {}", e)),
        };
        if let Some(message) = failure {
            error!("Agent run failed: {}", message);
            let _ = event_tx.send(adapter.error_event(message)).await;
        }
    });

    event_rx
}

/// Outcome of a run driven to completion.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub answer: AgentOutput,
    pub tally: TokenTally,
    pub files_generated: bool,
}

/// Run a task to completion, folding its steps through an adapter.
pub async fn run_task(runtime: &AgentRuntime, task: &str, reset: bool) -> Result<RunSummary> {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

    let run = async move { runtime.run(task, reset, &tx).await };
    let drain = async {
        let mut adapter = StreamAdapter::new();
        while let Some(step) = rx.recv().await {
            adapter.on_step(&step);
        }
        adapter
    };

    let (result, adapter) = tokio::join!(run, drain);
    Ok(RunSummary {
        answer: result?,
        tally: adapter.tally(),
        files_generated: adapter.files_generated(),
    })
}
