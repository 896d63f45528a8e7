//! The `query` tool.

use crate::error::McpError;
use crate::protocol::{ToolAnnotations, ToolDefinition};
use serde_json::{Value, json};

pub const QUERY_TOOL: &str = "query";

/// Byte cap applied when the caller does not set `maximumBytesBilled` (1 GB).
pub const DEFAULT_MAXIMUM_BYTES_BILLED: i64 = 1_000_000_000;

/// Descriptor returned by `tools/list`.
pub fn query_tool() -> ToolDefinition {
    ToolDefinition {
        name: QUERY_TOOL.to_string(),
        description: Some("Run a read-only BigQuery SQL query".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "sql": {"type": "string"},
                "maximumBytesBilled": {
                    "type": "string",
                    "description": "Maximum bytes billed (default: 1GB)"
                }
            },
            "required": ["sql"]
        }),
        annotations: Some(ToolAnnotations {
            read_only: Some(true),
        }),
    }
}

/// Validated arguments of a `query` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryArguments {
    pub sql: String,
    pub maximum_bytes_billed: i64,
}

impl QueryArguments {
    /// Validate raw tool arguments.
    ///
    /// `sql` must be a non-empty string. `maximumBytesBilled` may be a decimal
    /// string or a JSON integer.
    pub fn from_value(arguments: &Value) -> Result<Self, McpError> {
        let sql = match arguments.get("sql") {
            Some(Value::String(sql)) if !sql.trim().is_empty() => sql.clone(),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(McpError::InvalidParams("sql is required".to_string()));
            }
            Some(_) => return Err(McpError::InvalidParams("sql must be a string".to_string())),
        };

        let maximum_bytes_billed = match arguments.get("maximumBytesBilled") {
            None | Some(Value::Null) => DEFAULT_MAXIMUM_BYTES_BILLED,
            Some(Value::String(text)) => parse_byte_cap(text.trim())?,
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| invalid_byte_cap(&n.to_string()))?,
            Some(other) => return Err(invalid_byte_cap(&other.to_string())),
        };

        if maximum_bytes_billed < 0 {
            return Err(invalid_byte_cap(&maximum_bytes_billed.to_string()));
        }

        Ok(Self {
            sql,
            maximum_bytes_billed,
        })
    }
}

fn parse_byte_cap(text: &str) -> Result<i64, McpError> {
    text.parse::<i64>().map_err(|_| invalid_byte_cap(text))
}

fn invalid_byte_cap(raw: &str) -> McpError {
    McpError::InvalidParams(format!("maximumBytesBilled must be an integer, got {raw}"))
}
