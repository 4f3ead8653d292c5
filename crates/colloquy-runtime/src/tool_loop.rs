//! Bounded tool-round controller.
//!
//! Drives at most `max_rounds` reasoning-engine calls for one response
//! cycle, executing requested tool invocations between rounds. Exactly one
//! outcome per run; any engine failure is caught at cycle level and folded
//! into the visible answer rather than aborting the turn.

use serde_json::json;
use tracing::{debug, warn};

use colloquy_core::{CycleOutcome, QueryExecutor, ToolTrace};
use colloquy_engine::{ChatClient, ChatMessage, ChatRequest, ToolSpec};

use crate::emitter::EventEmitter;

/// Bounded loop over reasoning-engine rounds
pub struct ToolLoop {
    max_rounds: usize,
}

impl ToolLoop {
    /// Create a loop with the given round bound (clamped to at least 1)
    pub fn new(max_rounds: usize) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
        }
    }

    /// Run one cycle against the given history.
    ///
    /// The history is mutated in place: each executed tool invocation
    /// appends the engine's request message and the paired result message,
    /// so the next round sees both.
    pub async fn run(
        &self,
        client: &dyn ChatClient,
        executor: &dyn QueryExecutor,
        emitter: &EventEmitter,
        history: &mut Vec<ChatMessage>,
        tool: &ToolSpec,
    ) -> CycleOutcome {
        for round in 0..self.max_rounds {
            let request = ChatRequest {
                messages: history.clone(),
                tools: vec![tool.clone()],
            };

            let reply = match client.complete(request).await {
                Ok(reply) => reply,
                Err(err) => {
                    let diagnostic = err.to_string();
                    emitter
                        .emit_text(&format!("[backend error: {}]", diagnostic))
                        .await;
                    return CycleOutcome::Degraded {
                        text: emitter.accumulated().await,
                        diagnostic,
                    };
                }
            };

            if reply.has_tool_calls() {
                debug!(
                    round,
                    call_count = reply.tool_calls.len(),
                    "engine requested tool invocations"
                );
                let content = reply.content.clone();
                for call in &reply.tool_calls {
                    let query = parse_query_argument(&call.function.arguments);
                    let result = match executor.execute(&query).await {
                        Ok(rows) => json!({"ok": true, "rows": rows}),
                        Err(err) => json!({"ok": false, "error": err.to_string()}),
                    };

                    // Stream the invocation before the next round runs
                    emitter
                        .emit_tool(ToolTrace {
                            tool_name: call.function.name.clone(),
                            query: query.clone(),
                            result: result.clone(),
                        })
                        .await;

                    history.push(ChatMessage::assistant_tool_calls(
                        content.clone(),
                        vec![call.clone()],
                    ));
                    history.push(ChatMessage::tool_result(
                        call.id.clone(),
                        call.function.name.clone(),
                        result.to_string(),
                    ));
                }
                continue;
            }

            // No tool calls: this is the terminal answer
            let final_text = reply.content.unwrap_or_default();
            emitter.emit_text(&final_text).await;
            return CycleOutcome::Answered {
                text: emitter.accumulated().await,
            };
        }

        warn!(
            max_rounds = self.max_rounds,
            "round bound exhausted without a terminal text answer"
        );
        CycleOutcome::Answered {
            text: emitter.accumulated().await,
        }
    }
}

impl Default for ToolLoop {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Extract the `query` argument from a raw tool-call payload.
///
/// A malformed payload is treated as an empty argument set, never as a
/// fatal error; the resulting empty query fails the read-only gate and is
/// reported back into the engine's context like any other tool failure.
fn parse_query_argument(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .as_ref()
        .and_then(|v| v.get("query"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
