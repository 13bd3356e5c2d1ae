//! Agent runtime - tool-calling conversation loop over the profile store
//!
//! This crate is the conversational core of tailor. Each user turn flows
//! through it:
//! - Load the user's profile and surface any pending follow-up questions
//! - Ask the chat model for a reply, letting it call profile-editing tools
//! - Apply every returned command immediately through the mutator
//! - Relay the model's final text back verbatim
//!
//! # Key Types
//!
//! - `AgentRuntime` - Turn orchestrator (see `runtime` module)
//! - `ChatModel` - Pluggable trait for OpenAI / Azure OpenAI / Ollama
//! - `ProfileCommand` decoding - `tools` maps wire tool calls onto the closed
//!   command set
//!
//! # Safety Principle
//!
//! The model only ever speaks through the closed command set, and every
//! command is bound to the authenticated user at execution time. The model
//! never chooses whose record it edits.

pub mod model;
pub mod mutator;
pub mod openai;
pub mod runtime;
pub mod tools;

pub use model::{AgentMessage, AgentTurn, ChatModel, CommandCall, LlmError};
pub use mutator::ProfileMutator;
pub use openai::OpenAiChatModel;
pub use runtime::{AgentRuntime, AGENT_FAILURE_REPLY, STORE_UNAVAILABLE_REPLY};
pub use tools::ToolCallError;
