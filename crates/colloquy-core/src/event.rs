//! Stream event definitions for one response cycle.
//!
//! Events are an ordered, single-consumer sequence: a consumer observing
//! them can reconstruct exactly what happened and when. The concatenation
//! of all `Token` payloads equals the text committed as the assistant turn.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::safety::SafetyVerdict;

/// Record of one completed tool invocation, as shown to the consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTrace {
    /// Tool name as requested by the engine
    pub tool_name: String,
    /// The query argument that was executed (possibly empty)
    pub query: String,
    /// Wrapped result: `{"ok":true,"rows":[...]}` or `{"ok":false,"error":"..."}`
    pub result: Value,
}

/// Typed events delivered to the stream consumer - closed set.
///
/// Errors are not a distinct kind: diagnostic text is folded into `Token`
/// fragments so failures stay visible in the answer itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// One incremental fragment of answer text
    Token { text: String },

    /// One completed tool invocation with its result
    Tool { trace: ToolTrace },

    /// The pre-flight safety verdict; at most once, before any token/tool
    Safety { verdict: SafetyVerdict },

    /// Terminal event, exactly one per cycle, always last
    Done,
}

impl StreamEvent {
    /// Wire name of the event kind, used by transports with named events
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Token { .. } => "token",
            StreamEvent::Tool { .. } => "tool",
            StreamEvent::Safety { .. } => "safety",
            StreamEvent::Done => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_names_are_stable() {
        assert_eq!(StreamEvent::Token { text: "x".into() }.kind(), "token");
        assert_eq!(StreamEvent::Done.kind(), "done");
        let trace = ToolTrace {
            tool_name: "run_sql".to_string(),
            query: "SELECT 1".to_string(),
            result: json!({"ok": true, "rows": []}),
        };
        assert_eq!(StreamEvent::Tool { trace }.kind(), "tool");
    }

    #[test]
    fn test_tool_trace_serializes_with_wire_field_names() {
        let trace = ToolTrace {
            tool_name: "run_sql".to_string(),
            query: "SELECT name FROM products".to_string(),
            result: json!({"ok": false, "error": "boom"}),
        };
        let value = serde_json::to_value(&trace).unwrap();
        assert_eq!(value["tool_name"], "run_sql");
        assert_eq!(value["result"]["ok"], false);
    }
}
