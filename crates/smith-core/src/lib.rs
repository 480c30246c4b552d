//! Smith Core - chat relay agent
//!
//! This crate provides the relay itself:
//! - A connection loop that spawns one task per inbound chat message
//! - A bounded-window conversation history shared by all tasks
//! - Prompt assembly and pluggable generation backends
//! - Recognition and dispatch of tool calls embedded in generated text

pub mod connection;
pub mod history;
pub mod llm;
pub mod personality;
pub mod processor;
pub mod prompt;
pub mod tool_call;
pub mod tools;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use connection::{ConnectionLoop, FrameFilter, FrameKind, LoopExit, ReplySink, connect};
pub use history::{ChatMessage, ConversationHistory, Role};
pub use llm::{GenaiClient, GenerationClient, OllamaClient, client_from_config};
pub use personality::{AgentIdentity, Personality};
pub use processor::MessageProcessor;
pub use prompt::{Prompt, PromptBuilder, PromptSegment};
pub use tool_call::{ToolCall, parse_tool_call};
pub use tools::{AiTool, QueryDnsTool, ToolParameter, ToolRegistry, ToolSpec};
