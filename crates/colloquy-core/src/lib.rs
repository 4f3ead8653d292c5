//! # Colloquy Core
//!
//! Core abstractions and deterministic logic for the Colloquy agent service.
//!
//! This crate contains:
//! - Conversation / Turn / Role transcript definitions
//! - TranscriptStore / QueryExecutor trait seams
//! - StreamEvent definitions for one response cycle
//! - SafetyVerdict and CycleOutcome types
//!
//! This crate does NOT care about:
//! - How turns reach the service (HTTP, CLI, tests)
//! - Which reasoning engine produces answers
//! - How events are delivered to a consumer

pub mod event;
pub mod outcome;
pub mod query;
pub mod safety;
pub mod transcript;

// Re-export key types at crate root
pub use event::{StreamEvent, ToolTrace};
pub use outcome::CycleOutcome;
pub use query::{validate_read_only, QueryError, QueryExecutor, QueryRow};
pub use safety::SafetyVerdict;
pub use transcript::{
    Conversation, ConversationId, Role, StoreError, TranscriptStore, Turn, TurnId,
};
