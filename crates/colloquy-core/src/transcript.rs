//! Transcript type definitions and the store seam.
//!
//! The transcript is the durable, ordered record of all turns in a
//! conversation. Turns are append-only facts: never reordered, never
//! mutated after commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type alias for Conversation ID
pub type ConversationId = String;

/// Type alias for Turn ID
pub type TurnId = i64;

/// Speaker role of a turn - closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Stable string form used in storage and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a stored role string
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation - owns an ordered sequence of turns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier
    pub id: ConversationId,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Per-conversation credential override for the reasoning engine.
    /// Only reachable through the credential resolution seam.
    #[serde(default, skip_serializing)]
    pub credential_override: Option<String>,
}

impl Conversation {
    /// Create a new conversation with a fresh id
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            credential_override: None,
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn - one committed utterance in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique identifier, monotonically increasing within a store
    pub id: TurnId,
    /// Owning conversation
    pub conversation_id: ConversationId,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Speaker role
    pub role: Role,
    /// UTF-8 text body, unbounded length
    pub text: String,
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// TranscriptStore trait - async interface for durable transcript storage.
///
/// Appends are the only writes; a committed turn is immutable.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Create a new conversation and return it
    async fn create_conversation(&self) -> Result<Conversation, StoreError>;

    /// Get a conversation by id
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Set the per-conversation credential override
    async fn set_credential_override(
        &self,
        conversation_id: &str,
        credential: &str,
    ) -> Result<(), StoreError>;

    /// Append a turn and return the committed record
    async fn append_turn(
        &self,
        conversation_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Turn, StoreError>;

    /// Ordered turns for a conversation (insertion order = chronological)
    async fn turns(&self, conversation_id: &str) -> Result<Vec<Turn>, StoreError>;

    /// Latest turn of a conversation, if any
    async fn latest_turn(&self, conversation_id: &str) -> Result<Option<Turn>, StoreError>;

    /// Latest turn with the given role, if any
    async fn latest_turn_with_role(
        &self,
        conversation_id: &str,
        role: Role,
    ) -> Result<Option<Turn>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_storage_form() {
        assert_eq!(Role::parse(Role::User.as_str()), Some(Role::User));
        assert_eq!(Role::parse(Role::Assistant.as_str()), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
    }

    #[test]
    fn test_conversation_serialization_hides_credential() {
        let mut conv = Conversation::new();
        conv.credential_override = Some("sk-secret".to_string());
        let json = serde_json::to_string(&conv).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
