//! Error types for the MCP crate.

use crate::protocol::{JsonRpcError, codes};
use crate::resource::ResourceUriError;
use bqmcp_core::WarehouseError;
use bqmcp_guard::GuardError;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur in the MCP server.
///
/// Every request-level failure is converted to a JSON-RPC error object at the
/// dispatch boundary with [`McpError::to_rpc_error`].
#[derive(Debug, Error)]
pub enum McpError {
    /// Inbound bytes are not JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON that is not a request envelope.
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    /// Missing or malformed parameters.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error(transparent)]
    InvalidResourceUri(#[from] ResourceUriError),

    /// SQL refused by the read-only policy.
    #[error(transparent)]
    PolicyRejected(#[from] GuardError),

    /// The warehouse call failed.
    #[error(transparent)]
    Upstream(#[from] WarehouseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to start a transport.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// JSON-RPC error code for this failure.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::Parse(_) => codes::PARSE_ERROR,
            Self::InvalidRequest(_) => codes::INVALID_REQUEST,
            Self::MethodNotFound { .. } => codes::METHOD_NOT_FOUND,
            Self::InvalidParams(_) | Self::UnknownTool { .. } | Self::InvalidResourceUri(_) => {
                codes::INVALID_PARAMS
            }
            Self::PolicyRejected(_)
            | Self::Upstream(_)
            | Self::Serialization(_)
            | Self::StartupFailed(_)
            | Self::Io(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Client-side failures (bad envelope, bad params, policy) as opposed to
    /// failures of the server or the warehouse.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Parse(_)
                | Self::InvalidRequest(_)
                | Self::MethodNotFound { .. }
                | Self::InvalidParams(_)
                | Self::UnknownTool { .. }
                | Self::InvalidResourceUri(_)
                | Self::PolicyRejected(_)
        )
    }

    pub fn to_rpc_error(&self) -> JsonRpcError {
        let (message, data) = match self {
            Self::PolicyRejected(reason) => (reason.to_string(), None),
            Self::InvalidParams(detail) => (self.to_string(), Some(Value::String(detail.clone()))),
            Self::UnknownTool { .. } | Self::InvalidResourceUri(_) => {
                (self.to_string(), Some(Value::String(self.to_string())))
            }
            Self::Upstream(_) | Self::Serialization(_) | Self::StartupFailed(_) | Self::Io(_) => (
                "Internal error".to_string(),
                Some(Value::String(self.to_string())),
            ),
            Self::Parse(_) | Self::InvalidRequest(_) | Self::MethodNotFound { .. } => {
                (self.to_string(), None)
            }
        };

        JsonRpcError {
            code: self.rpc_code(),
            message,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bqmcp_guard::READ_ONLY_VIOLATION;

    #[test]
    fn test_method_not_found() {
        let err = McpError::MethodNotFound {
            method: "foo/bar".to_string(),
        }
        .to_rpc_error();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Method not found: foo/bar");
        assert!(err.data.is_none());
    }

    #[test]
    fn test_policy_rejection_uses_reason_as_message() {
        let err = McpError::from(GuardError::Rejected {
            reason: READ_ONLY_VIOLATION.to_string(),
        })
        .to_rpc_error();
        assert_eq!(err.code, -32603);
        assert_eq!(err.message, READ_ONLY_VIOLATION);
    }

    #[test]
    fn test_upstream_message_is_attached_as_data() {
        let err = McpError::from(WarehouseError::Upstream("Quota exceeded".to_string()))
            .to_rpc_error();
        assert_eq!(err.code, -32603);
        assert_eq!(err.message, "Internal error");
        assert_eq!(err.data, Some(Value::String("Quota exceeded".to_string())));
    }

    #[test]
    fn test_invalid_params() {
        let err = McpError::InvalidParams("sql is required".to_string());
        assert!(err.is_client_error());
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, -32602);
        assert_eq!(rpc.message, "Invalid params: sql is required");
        assert_eq!(rpc.data, Some(Value::String("sql is required".to_string())));
    }
}
