//! In-memory TranscriptStore implementation for development and testing.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use colloquy_core::{Conversation, Role, StoreError, TranscriptStore, Turn};

/// In-memory transcript store. Turn ids are monotonic across the store,
/// matching the ordering contract of the SQLite backend.
pub struct InMemoryTranscriptStore {
    conversations: RwLock<HashMap<String, Conversation>>,
    turns: RwLock<Vec<Turn>>,
    next_turn_id: RwLock<i64>,
}

impl InMemoryTranscriptStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            turns: RwLock::new(Vec::new()),
            next_turn_id: RwLock::new(1),
        }
    }
}

impl Default for InMemoryTranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn create_conversation(&self) -> Result<Conversation, StoreError> {
        let conversation = Conversation::new();
        let mut conversations = self
            .conversations
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        conversations.insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        let conversations = self
            .conversations
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(conversations.get(conversation_id).cloned())
    }

    async fn set_credential_override(
        &self,
        conversation_id: &str,
        credential: &str,
    ) -> Result<(), StoreError> {
        let mut conversations = self
            .conversations
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        conversation.credential_override = Some(credential.to_string());
        Ok(())
    }

    async fn append_turn(
        &self,
        conversation_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Turn, StoreError> {
        {
            let conversations = self
                .conversations
                .read()
                .map_err(|e| StoreError::Internal(e.to_string()))?;
            if !conversations.contains_key(conversation_id) {
                return Err(StoreError::NotFound(conversation_id.to_string()));
            }
        }

        let mut next_id = self
            .next_turn_id
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let turn = Turn {
            id: *next_id,
            conversation_id: conversation_id.to_string(),
            created_at: Utc::now(),
            role,
            text: text.to_string(),
        };
        *next_id += 1;

        let mut turns = self
            .turns
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        turns.push(turn.clone());
        Ok(turn)
    }

    async fn turns(&self, conversation_id: &str) -> Result<Vec<Turn>, StoreError> {
        let turns = self
            .turns
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(turns
            .iter()
            .filter(|t| t.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn latest_turn(&self, conversation_id: &str) -> Result<Option<Turn>, StoreError> {
        let turns = self
            .turns
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(turns
            .iter()
            .filter(|t| t.conversation_id == conversation_id)
            .last()
            .cloned())
    }

    async fn latest_turn_with_role(
        &self,
        conversation_id: &str,
        role: Role,
    ) -> Result<Option<Turn>, StoreError> {
        let turns = self
            .turns
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(turns
            .iter()
            .filter(|t| t.conversation_id == conversation_id && t.role == role)
            .last()
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_keep_insertion_order() {
        tokio_test::block_on(async {
            let store = InMemoryTranscriptStore::new();
            let conv = store.create_conversation().await.unwrap();

            store.append_turn(&conv.id, Role::User, "one").await.unwrap();
            store
                .append_turn(&conv.id, Role::Assistant, "two")
                .await
                .unwrap();
            store.append_turn(&conv.id, Role::User, "three").await.unwrap();

            let turns = store.turns(&conv.id).await.unwrap();
            let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
            assert_eq!(texts, vec!["one", "two", "three"]);
            assert!(turns.windows(2).all(|w| w[0].id < w[1].id));
        });
    }

    #[test]
    fn test_latest_turn_with_role_skips_other_roles() {
        tokio_test::block_on(async {
            let store = InMemoryTranscriptStore::new();
            let conv = store.create_conversation().await.unwrap();

            store
                .append_turn(&conv.id, Role::User, "question")
                .await
                .unwrap();
            store
                .append_turn(&conv.id, Role::Assistant, "answer")
                .await
                .unwrap();

            let latest = store.latest_turn(&conv.id).await.unwrap().unwrap();
            assert_eq!(latest.role, Role::Assistant);

            let latest_user = store
                .latest_turn_with_role(&conv.id, Role::User)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(latest_user.text, "question");
        });
    }

    #[test]
    fn test_append_to_unknown_conversation_fails() {
        tokio_test::block_on(async {
            let store = InMemoryTranscriptStore::new();
            let result = store.append_turn("missing", Role::User, "hi").await;
            assert!(matches!(result, Err(StoreError::NotFound(_))));
        });
    }

    #[test]
    fn test_credential_override_round_trip() {
        tokio_test::block_on(async {
            let store = InMemoryTranscriptStore::new();
            let conv = store.create_conversation().await.unwrap();

            store
                .set_credential_override(&conv.id, "sk-test")
                .await
                .unwrap();
            let loaded = store.get_conversation(&conv.id).await.unwrap().unwrap();
            assert_eq!(loaded.credential_override.as_deref(), Some("sk-test"));
        });
    }
}
