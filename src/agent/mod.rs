//! Agent module — core agent logic.
//!
//! This module contains:
//! - Message and step record types
//! - LLM client trait and implementations
//! - Agent runtime that turns a task into step records
//! - Context builder for prompts
//! - Token accounting shared with the stream adapter
//!
//! # Adding a New LLM Provider
//!
//! See [`llm::ProviderRegistry`] for instructions.

mod context;
mod loop_impl;
mod message;
pub mod step;
pub mod tokens;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use context::Context;
pub use llm::{GeminiClient, LlmClient, LlmResponse, ProviderRegistry, Usage};
pub use loop_impl::AgentRuntime;
pub use message::{Message, Role, ToolCallRequest};
pub use step::{ActionStep, AgentOutput, PlanningStep, Step, TaskStep};
pub use tokens::TokenTally;
