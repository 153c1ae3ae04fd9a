//! Agency - multi-step AI agent with a streaming chat backend
//!
//! This library provides the agent runtime, its tools, and the streaming
//! adapter that turns agent steps into chat-UI events for the terminal and
//! the browser.

pub mod agent;
pub mod tools;
pub mod stream;
pub mod files;
pub mod adapters;
pub mod config;
pub mod error;
pub mod ui;

pub use error::{Error, Result};
