//! Declared tool schema.
//!
//! This system exposes a single fixed tool: `run_sql`, taking one required
//! string argument `query`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Tool declaration in the engine's wire shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunctionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: ToolFunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// The read-only SQL tool declaration
pub fn sql_tool_spec() -> ToolSpec {
    ToolSpec::function(
        "run_sql",
        "execute a READ-ONLY SQL SELECT query against the app database. \
         tables available: products, conversations, turns. \
         only use existing columns from the provided schema.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "a complete sql SELECT statement. must start with SELECT."
                }
            },
            "required": ["query"]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_tool_spec_shape() {
        let spec = sql_tool_spec();
        assert_eq!(spec.name(), "run_sql");
        assert_eq!(spec.kind, "function");

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["parameters"]["required"][0], "query");
    }
}
