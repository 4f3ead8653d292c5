//! HTTP chat client using an OpenAI-compatible API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{
    ChatClient, ChatClientFactory, ChatMessage, ChatRequest, EngineError, EngineReply,
    ToolCallRequest,
};
use crate::tool::ToolSpec;

/// HTTP client config (OpenAI-compatible)
#[derive(Debug, Clone)]
pub struct OpenAiClientConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-5-mini".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Chat client speaking the OpenAI chat-completions wire format,
/// bound to one credential
pub struct OpenAiChatClient {
    client: reqwest::Client,
    config: OpenAiClientConfig,
    api_key: String,
}

impl OpenAiChatClient {
    pub fn new(config: OpenAiClientConfig, api_key: impl Into<String>) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Http(e.to_string()))?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSpec]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<EngineReply, EngineError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", self.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| EngineError::Http(e.to_string()))?,
        );

        let body = WireRequest {
            model: &self.config.model,
            messages: &request.messages,
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(&request.tools)
            },
            tool_choice: if request.tools.is_empty() {
                None
            } else {
                Some("auto")
            },
        };

        debug!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            "engine request prepared"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Response(format!("HTTP {}: {}", status, text)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Http(e.to_string()))?;
        let parsed: WireResponse =
            serde_json::from_str(&text).map_err(|e| EngineError::Serialization(e.to_string()))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| EngineError::Response("Missing choices".to_string()))?;

        Ok(EngineReply {
            content: message.content,
            tool_calls: message.tool_calls.unwrap_or_default(),
        })
    }
}

/// Default factory binding the shared client config to per-cycle credentials
pub struct OpenAiClientFactory {
    config: OpenAiClientConfig,
}

impl OpenAiClientFactory {
    pub fn new(config: OpenAiClientConfig) -> Self {
        Self { config }
    }
}

impl ChatClientFactory for OpenAiClientFactory {
    fn client_for(&self, credential: &str) -> Result<Arc<dyn ChatClient>, EngineError> {
        let client = OpenAiChatClient::new(self.config.clone(), credential)?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::sql_tool_spec;

    #[test]
    fn test_wire_request_omits_tools_when_empty() {
        let messages = vec![ChatMessage::user("hi")];
        let body = WireRequest {
            model: "gpt-5-mini",
            messages: &messages,
            tools: None,
            tool_choice: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
    }

    #[test]
    fn test_wire_request_declares_auto_tool_choice() {
        let messages = vec![ChatMessage::user("hi")];
        let tools = vec![sql_tool_spec()];
        let body = WireRequest {
            model: "gpt-5-mini",
            messages: &messages,
            tools: Some(&tools),
            tool_choice: Some("auto"),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["tool_choice"], "auto");
        assert_eq!(value["tools"][0]["function"]["name"], "run_sql");
    }

    #[test]
    fn test_wire_response_parses_tool_calls() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call-1",
                        "type": "function",
                        "function": {"name": "run_sql", "arguments": "{\"query\":\"SELECT 1\"}"}
                    }]
                }
            }]
        }"#;
        let parsed: WireResponse = serde_json::from_str(raw).unwrap();
        let message = &parsed.choices[0].message;
        assert!(message.content.is_none());
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "run_sql");
    }
}
