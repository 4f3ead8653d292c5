//! # Colloquy Stores
//!
//! TranscriptStore and QueryExecutor implementations:
//! - In-memory stores for development and testing
//! - SQLite-backed stores for the server

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryTranscriptStore;
pub use sqlite::{SqliteQueryExecutor, SqliteTranscriptStore};
