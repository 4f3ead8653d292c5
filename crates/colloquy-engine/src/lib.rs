//! # Colloquy Engine
//!
//! Reasoning-engine client for Colloquy.
//!
//! The engine is an opaque collaborator behind the [`ChatClient`] trait:
//! given an ordered message history and a declared tool, it returns either
//! free text or one or more tool invocation requests. The default
//! implementation speaks the OpenAI chat-completions wire format; a scripted
//! mock is provided for tests.

pub mod client;
pub mod openai;
pub mod prompts;
pub mod safety;
pub mod tool;

pub use client::{
    ChatClient, ChatClientFactory, ChatMessage, ChatRequest, EngineError, EngineReply,
    MockChatClient, ToolCallFunction, ToolCallRequest,
};
pub use openai::{OpenAiChatClient, OpenAiClientConfig, OpenAiClientFactory};
pub use safety::classify;
pub use tool::{sql_tool_spec, ToolFunctionSpec, ToolSpec};
