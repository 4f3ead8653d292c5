//! Chat client trait and message types.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tool::ToolSpec;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One requested tool invocation, with the correlation token used to pair
/// it with its result when replayed into the engine's context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// Raw argument payload, expected (but not guaranteed) to parse as JSON
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: "function".to_string(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// One role-tagged entry of the working message history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    /// Assistant message carrying tool calls, replayed into the history
    /// so the engine sees its own request alongside the result
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.unwrap_or_default()),
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool-result message paired to a request by its correlation token
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }
}

/// One engine call: the current history plus the declared tools.
///
/// `tool_choice` is always `auto` when tools are declared - the engine
/// decides whether to answer or to invoke a tool.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// Engine reply: free text, tool calls, or both
#[derive(Debug, Clone, Default)]
pub struct EngineReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl EngineReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Chat client trait - one opaque call to the reasoning engine
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<EngineReply, EngineError>;
}

#[async_trait]
impl ChatClient for Arc<dyn ChatClient> {
    async fn complete(&self, request: ChatRequest) -> Result<EngineReply, EngineError> {
        (**self).complete(request).await
    }
}

/// Factory trait for building clients bound to a resolved credential.
///
/// Credentials are per-cycle (a conversation may carry its own override),
/// so clients are constructed at cycle start rather than held globally.
pub trait ChatClientFactory: Send + Sync {
    fn client_for(&self, credential: &str) -> Result<Arc<dyn ChatClient>, EngineError>;
}

/// Scripted chat client for tests and examples.
///
/// Replies are consumed in order; calling past the script returns a
/// response error. Received requests are recorded for assertions.
pub struct MockChatClient {
    replies: std::sync::Mutex<std::collections::VecDeque<Result<EngineReply, EngineError>>>,
    requests: std::sync::Mutex<Vec<ChatRequest>>,
}

impl MockChatClient {
    pub fn new(replies: Vec<Result<EngineReply, EngineError>>) -> Self {
        Self {
            replies: std::sync::Mutex::new(replies.into()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Number of calls the client has received
    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    /// Snapshot of all received requests
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<EngineReply, EngineError> {
        self.requests.lock().expect("requests lock").push(request);
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::Response("mock script exhausted".to_string())))
    }
}
