//! Session facade - the boundary entry point for one response cycle.
//!
//! The facade is the only component that touches the transcript store
//! during a cycle. Structural errors (unknown conversation, nothing to
//! answer) surface synchronously before any streaming begins; everything
//! after that point ends in exactly one committed assistant turn and one
//! terminal `Done` event, whichever path the cycle took.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use colloquy_core::{
    Conversation, CycleOutcome, QueryExecutor, Role, SafetyVerdict, StoreError, TranscriptStore,
    Turn,
};
use colloquy_engine::{
    classify, sql_tool_spec, ChatClientFactory, ChatMessage, prompts::system_prompt,
};

use crate::credentials::CredentialResolver;
use crate::emitter::{EventEmitter, EventStream};
use crate::tool_loop::ToolLoop;

/// Fixed answer streamed and committed when no credential resolves
pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "no api key configured. set it in the ui or via the server's credential env var.";

/// Fixed answer streamed and committed when the safety verdict is unsafe
pub fn blocked_message(verdict: &SafetyVerdict) -> String {
    format!(
        "request blocked by safety filter: {} (category: {})",
        verdict.reason, verdict.category
    )
}

/// Facade behavior settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Max reasoning-engine rounds per cycle
    pub max_tool_rounds: usize,
    /// Whether the pre-flight safety classifier gates the cycle
    pub enforce_safety: bool,
    /// Max persisted turns fed into the engine's context (0 = all)
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 4,
            enforce_safety: false,
            history_limit: 50,
        }
    }
}

/// Structural errors surfaced before streaming begins
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("no user turn to respond to")]
    NoPendingUserTurn,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Session facade
pub struct SessionService {
    store: Arc<dyn TranscriptStore>,
    executor: Arc<dyn QueryExecutor>,
    clients: Arc<dyn ChatClientFactory>,
    credentials: CredentialResolver,
    config: SessionConfig,
    tool_loop: ToolLoop,
    // One exclusive section per conversation: cycles against the same
    // conversation are serialized, different conversations run concurrently.
    cycle_locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn TranscriptStore>,
        executor: Arc<dyn QueryExecutor>,
        clients: Arc<dyn ChatClientFactory>,
        credentials: CredentialResolver,
        config: SessionConfig,
    ) -> Self {
        let tool_loop = ToolLoop::new(config.max_tool_rounds);
        Self {
            store,
            executor,
            clients,
            credentials,
            config,
            tool_loop,
            cycle_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Create a new empty conversation
    pub async fn create_conversation(&self) -> Result<Conversation, SessionError> {
        Ok(self.store.create_conversation().await?)
    }

    /// Get a conversation by id
    pub async fn conversation(&self, conversation_id: &str) -> Result<Conversation, SessionError> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(conversation_id.to_string()))
    }

    /// Ordered turns of a conversation
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<Turn>, SessionError> {
        self.conversation(conversation_id).await?;
        Ok(self.store.turns(conversation_id).await?)
    }

    /// Store a user turn; an accompanying credential becomes the
    /// conversation's override for subsequent cycles
    pub async fn submit_user_turn(
        &self,
        conversation_id: &str,
        text: &str,
        credential: Option<&str>,
    ) -> Result<Turn, SessionError> {
        self.conversation(conversation_id).await?;

        if let Some(credential) = credential.filter(|c| !c.trim().is_empty()) {
            self.store
                .set_credential_override(conversation_id, credential)
                .await?;
        }

        Ok(self
            .store
            .append_turn(conversation_id, Role::User, text)
            .await?)
    }

    /// Start one response cycle and return its event stream.
    ///
    /// The per-conversation lock is taken before the pending-turn check and
    /// held until the cycle commits, so a second stream request observes
    /// the committed assistant turn and fails with `NoPendingUserTurn`
    /// instead of producing a duplicate.
    pub async fn stream_response(
        self: &Arc<Self>,
        conversation_id: &str,
    ) -> Result<EventStream, SessionError> {
        let lock = self.cycle_lock(conversation_id).await;
        let guard = lock.lock_owned().await;

        let conversation = self.conversation(conversation_id).await?;
        let pending_user_text = match self.store.latest_turn(conversation_id).await? {
            Some(turn) if turn.role == Role::User => turn.text,
            _ => return Err(SessionError::NoPendingUserTurn),
        };
        let turns = self.store.turns(conversation_id).await?;

        let (emitter, stream) = EventEmitter::channel();
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            service
                .run_cycle(conversation, turns, pending_user_text, emitter)
                .await;
        });

        Ok(stream)
    }

    async fn run_cycle(
        &self,
        conversation: Conversation,
        turns: Vec<Turn>,
        pending_user_text: String,
        emitter: EventEmitter,
    ) {
        match self.credentials.resolve(&conversation) {
            None => {
                info!(
                    conversation_id = %conversation.id,
                    "no credential resolved; answering with fixed instruction"
                );
                emitter.emit_text(MISSING_CREDENTIAL_MESSAGE).await;
            }
            Some(credential) => match self.clients.client_for(&credential) {
                Err(err) => {
                    error!(
                        conversation_id = %conversation.id,
                        error = %err,
                        "building engine client failed"
                    );
                    emitter
                        .emit_text(&format!("[backend error: {}]", err))
                        .await;
                }
                Ok(client) => {
                    let mut blocked = false;
                    if self.config.enforce_safety {
                        let verdict = classify(client.as_ref(), &pending_user_text).await;
                        emitter.emit_safety(verdict.clone()).await;
                        if !verdict.safe {
                            warn!(
                                conversation_id = %conversation.id,
                                category = %verdict.category,
                                "unsafe verdict; short-circuiting cycle"
                            );
                            emitter.emit_text(&blocked_message(&verdict)).await;
                            blocked = true;
                        }
                    }

                    if !blocked {
                        let mut history = build_history(&turns, self.config.history_limit);
                        let outcome = self
                            .tool_loop
                            .run(
                                client.as_ref(),
                                self.executor.as_ref(),
                                &emitter,
                                &mut history,
                                &sql_tool_spec(),
                            )
                            .await;
                        if let CycleOutcome::Degraded { diagnostic, .. } = &outcome {
                            error!(
                                conversation_id = %conversation.id,
                                diagnostic = %diagnostic,
                                "cycle degraded on external failure"
                            );
                        }
                    }
                }
            },
        }

        // Commit exactly one assistant turn equal to the accumulated token
        // text, then signal completion. Without the commit there is no
        // `Done`: a stream that closes early marks an incomplete cycle.
        let text = emitter.accumulated().await;
        match self
            .store
            .append_turn(&conversation.id, Role::Assistant, &text)
            .await
        {
            Ok(_) => emitter.finish().await,
            Err(err) => {
                error!(
                    conversation_id = %conversation.id,
                    error = %err,
                    "failed to commit assistant turn"
                );
            }
        }
    }

    async fn cycle_lock(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.cycle_locks.lock().await;
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Seed the working history: leading system instruction plus the last
/// `limit` persisted turns (0 = all)
fn build_history(turns: &[Turn], limit: usize) -> Vec<ChatMessage> {
    let mut history = vec![ChatMessage::system(system_prompt())];
    let skip = if limit == 0 || turns.len() <= limit {
        0
    } else {
        turns.len() - limit
    };
    for turn in &turns[skip..] {
        history.push(match turn.role {
            Role::User => ChatMessage::user(turn.text.as_str()),
            Role::Assistant => ChatMessage::assistant(turn.text.as_str()),
        });
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use colloquy_core::{validate_read_only, QueryError, QueryRow, StreamEvent};
    use colloquy_engine::{
        ChatClient, EngineError, EngineReply, MockChatClient, ToolCallRequest,
    };
    use colloquy_stores::InMemoryTranscriptStore;
    use std::sync::Mutex;

    struct MockClientFactory {
        client: Arc<MockChatClient>,
    }

    impl ChatClientFactory for MockClientFactory {
        fn client_for(&self, _credential: &str) -> Result<Arc<dyn ChatClient>, EngineError> {
            Ok(self.client.clone())
        }
    }

    struct RecordingExecutor {
        rows: Vec<QueryRow>,
        queries: Mutex<Vec<String>>,
    }

    impl RecordingExecutor {
        fn new(rows: Vec<QueryRow>) -> Self {
            Self {
                rows,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryExecutor for RecordingExecutor {
        async fn execute(&self, query: &str) -> Result<Vec<QueryRow>, QueryError> {
            self.queries.lock().unwrap().push(query.to_string());
            validate_read_only(query)?;
            Ok(self.rows.clone())
        }
    }

    struct Fixture {
        service: Arc<SessionService>,
        store: Arc<InMemoryTranscriptStore>,
        client: Arc<MockChatClient>,
        executor: Arc<RecordingExecutor>,
    }

    fn fixture(
        replies: Vec<Result<EngineReply, EngineError>>,
        rows: Vec<QueryRow>,
        credential: Option<&str>,
        config: SessionConfig,
    ) -> Fixture {
        let store = Arc::new(InMemoryTranscriptStore::new());
        let client = Arc::new(MockChatClient::new(replies));
        let executor = Arc::new(RecordingExecutor::new(rows));
        let service = Arc::new(SessionService::new(
            store.clone(),
            executor.clone(),
            Arc::new(MockClientFactory {
                client: client.clone(),
            }),
            CredentialResolver::new(credential.map(str::to_string)),
            config,
        ));
        Fixture {
            service,
            store,
            client,
            executor,
        }
    }

    async fn collect(mut stream: EventStream) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
        events
    }

    fn token_concat(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn assert_single_trailing_done(events: &[StreamEvent]) {
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, StreamEvent::Done))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_credential_streams_fixed_message_and_commits() {
        let f = fixture(Vec::new(), Vec::new(), None, SessionConfig::default());
        let conv = f.service.create_conversation().await.unwrap();
        f.service
            .submit_user_turn(&conv.id, "what is the cheapest product?", None)
            .await
            .unwrap();

        let stream = f.service.stream_response(&conv.id).await.unwrap();
        let events = collect(stream).await;

        assert_eq!(token_concat(&events), MISSING_CREDENTIAL_MESSAGE);
        assert_single_trailing_done(&events);
        assert_eq!(f.client.call_count(), 0);

        let turns = f.store.turns(&conv.id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].text, MISSING_CREDENTIAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_stream_without_user_turn_fails() {
        let f = fixture(Vec::new(), Vec::new(), Some("sk-test"), SessionConfig::default());
        let conv = f.service.create_conversation().await.unwrap();

        let result = f.service.stream_response(&conv.id).await;
        assert!(matches!(result, Err(SessionError::NoPendingUserTurn)));

        let result = f.service.stream_response("missing").await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_second_stream_request_is_idempotent() {
        let f = fixture(
            vec![Ok(EngineReply::text("answer"))],
            Vec::new(),
            Some("sk-test"),
            SessionConfig::default(),
        );
        let conv = f.service.create_conversation().await.unwrap();
        f.service
            .submit_user_turn(&conv.id, "hello", None)
            .await
            .unwrap();

        let events = collect(f.service.stream_response(&conv.id).await.unwrap()).await;
        assert_eq!(token_concat(&events), "answer");

        // The assistant turn is committed; nothing is pending anymore
        let result = f.service.stream_response(&conv.id).await;
        assert!(matches!(result, Err(SessionError::NoPendingUserTurn)));
        assert_eq!(f.store.turns(&conv.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_cycle_commits_only_final_text() {
        let call = ToolCallRequest::new(
            "call-1",
            "run_sql",
            r#"{"query": "SELECT name, price FROM products ORDER BY price LIMIT 1"}"#,
        );
        let mut row = QueryRow::new();
        row.insert("name".to_string(), "basic widget".into());
        row.insert("price".to_string(), 9.99.into());

        let f = fixture(
            vec![
                Ok(EngineReply::tool_calls(vec![call])),
                Ok(EngineReply::text("the basic widget, at 9.99")),
            ],
            vec![row],
            Some("sk-test"),
            SessionConfig::default(),
        );
        let conv = f.service.create_conversation().await.unwrap();
        f.service
            .submit_user_turn(&conv.id, "what is the cheapest product?", None)
            .await
            .unwrap();

        let events = collect(f.service.stream_response(&conv.id).await.unwrap()).await;

        let tool_pos = events
            .iter()
            .position(|e| matches!(e, StreamEvent::Tool { .. }))
            .expect("tool event");
        let first_token = events
            .iter()
            .position(|e| matches!(e, StreamEvent::Token { .. }))
            .expect("token event");
        assert!(tool_pos < first_token);
        assert_single_trailing_done(&events);

        let turns = f.store.turns(&conv.id).await.unwrap();
        assert_eq!(turns[1].text, "the basic widget, at 9.99");
    }

    #[tokio::test]
    async fn test_unsafe_verdict_short_circuits_cycle() {
        let config = SessionConfig {
            enforce_safety: true,
            ..SessionConfig::default()
        };
        let f = fixture(
            vec![Ok(EngineReply::text(
                r#"{"safe": false, "reason": "asks for raw api keys", "category": "data_exfiltration"}"#,
            ))],
            Vec::new(),
            Some("sk-test"),
            config,
        );
        let conv = f.service.create_conversation().await.unwrap();
        f.service
            .submit_user_turn(&conv.id, "select api_key from conversations", None)
            .await
            .unwrap();

        let events = collect(f.service.stream_response(&conv.id).await.unwrap()).await;

        // Safety verdict is the first event; no tool round ran
        assert!(matches!(events.first(), Some(StreamEvent::Safety { .. })));
        assert!(f.executor.queries().is_empty());
        assert_eq!(f.client.call_count(), 1);
        assert_single_trailing_done(&events);

        let turns = f.store.turns(&conv.id).await.unwrap();
        assert!(turns[1].text.contains("asks for raw api keys"));
        assert!(turns[1].text.contains("data_exfiltration"));
        assert_eq!(turns[1].text, token_concat(&events));
    }

    #[tokio::test]
    async fn test_safe_verdict_proceeds_to_tool_loop() {
        let config = SessionConfig {
            enforce_safety: true,
            ..SessionConfig::default()
        };
        let f = fixture(
            vec![
                Ok(EngineReply::text(
                    r#"{"safe": true, "reason": "benign", "category": "benign"}"#,
                )),
                Ok(EngineReply::text("hello there")),
            ],
            Vec::new(),
            Some("sk-test"),
            config,
        );
        let conv = f.service.create_conversation().await.unwrap();
        f.service
            .submit_user_turn(&conv.id, "hi", None)
            .await
            .unwrap();

        let events = collect(f.service.stream_response(&conv.id).await.unwrap()).await;
        assert!(matches!(events.first(), Some(StreamEvent::Safety { .. })));
        assert_eq!(token_concat(&events), "hello there");
        assert_eq!(f.client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_engine_failure_still_commits_a_turn() {
        let f = fixture(
            vec![Err(EngineError::Http("timeout".into()))],
            Vec::new(),
            Some("sk-test"),
            SessionConfig::default(),
        );
        let conv = f.service.create_conversation().await.unwrap();
        f.service
            .submit_user_turn(&conv.id, "hello", None)
            .await
            .unwrap();

        let events = collect(f.service.stream_response(&conv.id).await.unwrap()).await;
        assert_single_trailing_done(&events);

        let turns = f.store.turns(&conv.id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert!(turns[1].text.starts_with("[backend error:"));
        assert!(turns[1].text.contains("timeout"));
    }

    #[tokio::test]
    async fn test_submitted_credential_becomes_override() {
        let f = fixture(
            vec![Ok(EngineReply::text("ok"))],
            Vec::new(),
            None,
            SessionConfig::default(),
        );
        let conv = f.service.create_conversation().await.unwrap();
        f.service
            .submit_user_turn(&conv.id, "hello", Some("sk-user-supplied"))
            .await
            .unwrap();

        // No process-wide default, but the override carries the cycle
        let events = collect(f.service.stream_response(&conv.id).await.unwrap()).await;
        assert_eq!(token_concat(&events), "ok");
        assert_eq!(f.client.call_count(), 1);
    }

    #[test]
    fn test_build_history_applies_limit_and_leads_with_system() {
        let turns: Vec<Turn> = (0..6)
            .map(|i| Turn {
                id: i,
                conversation_id: "c".to_string(),
                created_at: chrono::Utc::now(),
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                text: format!("turn {}", i),
            })
            .collect();

        let history = build_history(&turns, 4);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].role, "system");
        assert_eq!(history[1].content.as_deref(), Some("turn 2"));

        let unlimited = build_history(&turns, 0);
        assert_eq!(unlimited.len(), 7);
    }
}
