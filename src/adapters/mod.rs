//! Adapters module — front ends for the agent.
//!
//! Each adapter implements the [`Channel`] trait for uniform handling.
//!
//! # Supported Channels
//!
//! - **CLI** — terminal rendering of the event stream
//! - **Web** — HTTP backend for the browser chat UI (axum)
//!
//! # Adding a New Channel
//!
//! 1. Create a new module (e.g., `slack.rs`)
//! 2. Implement the [`Channel`] trait
//! 3. Add to [`ChannelRegistry`]

pub mod cli;
pub mod web;

/// Channel trait for agent front ends.
///
/// All channel implementations must be [`Send`] + [`Sync`] for async compatibility.
pub trait Channel: Send + Sync {
    /// Channel name (e.g., "web", "cli").
    fn name(&self) -> &str;

    /// Start serving until stopped.
    fn start(&self) -> impl std::future::Future<Output = crate::Result<()>> + Send;

    /// Stop the channel.
    fn stop(&self) -> impl std::future::Future<Output = crate::Result<()>> + Send;
}

/// Channel registry — metadata about available channels.
pub struct ChannelRegistry;

impl ChannelRegistry {
    /// List all available channel names.
    pub fn available() -> &'static [&'static str] {
        &["cli", "web"]
    }

    /// Get a human-readable description of a channel.
    pub fn description(name: &str) -> &'static str {
        match name {
            "cli" => "Interactive command line interface",
            "web" => "HTTP backend streaming to the browser UI",
            _ => "Unknown channel",
        }
    }
}
