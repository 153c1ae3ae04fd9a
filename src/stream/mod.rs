//! Streaming adapter: agent steps to chat messages to wire events.
//!
//! ```text
//! Step ──convert──► ChatMessage ──classify──► StreamEvent ──► NDJSON / SSE / terminal
//! ```
//!
//! [`StreamAdapter`] holds the per-run state (token totals, tool-call
//! tracker, generated-files flag). [`stream_task`] wires a runtime and an
//! adapter together on the tokio runtime.

pub mod chat;
pub mod classify;
pub mod convert;
mod adapter;
mod events;
mod session;

pub use adapter::StreamAdapter;
pub use chat::{ChatMessage, ChatRole, MessageContent, MessageMetadata, MessageStatus};
pub use classify::{classify, MessageKind};
pub use convert::{messages_for_step, ToolCallTracker};
pub use events::StreamEvent;
pub use session::{run_task, stream_task, RunSummary};
