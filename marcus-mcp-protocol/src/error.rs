//! Error handling for the MCP transport layer.
//!
//! Two error surfaces exist and must not be confused:
//!
//! - *Transport* errors — malformed JSON, an unknown method, a handshake
//!   violation — are JSON-RPC protocol errors, reported via the standard
//!   reserved code range and carried in the envelope's `error` field.
//! - *Tool* errors — a task not found, a lost assignment race, a provider
//!   outage — are business outcomes. They are NOT JSON-RPC errors: the
//!   request succeeded at the transport level, so they're serialized as
//!   `{"success": false, "error_kind": ..., "message": ...}` inside the
//!   ordinary `result` field. [`crate::serialization::tool_error_result`]
//!   builds that payload directly from [`MarcusError::kind`].
//!
//! [`McpError`] models only the first surface; the second never needs to
//! become a JSON-RPC error object.

use marcus_core::MarcusError;
use serde_json::{json, Value};
use thiserror::Error;

/// A failure in the JSON-RPC transport itself, independent of any tool's
/// business logic.
#[derive(Error, Debug, Clone)]
pub enum McpError {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// JSON-RPC 2.0's reserved error code for this failure.
    pub fn to_error_code(&self) -> i32 {
        match self {
            McpError::ParseError(_) => -32700,
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::InvalidParams(_) => -32602,
            McpError::Internal(_) => -32603,
        }
    }

    pub fn to_json_rpc_error(&self, id: Option<Value>) -> Value {
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": self.to_error_code(),
                "message": self.to_string()
            },
            "id": id
        })
    }
}

/// A `serde_json` parse failure is always a transport-level parse error.
impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::ParseError(err.to_string())
    }
}

/// Surfaces a core error that escaped tool-level handling (should be rare —
/// most `MarcusError`s are caught by the dispatcher and turned into a
/// `{success: false, ...}` result instead) as an internal transport error.
impl From<MarcusError> for McpError {
    fn from(err: MarcusError) -> Self {
        McpError::Internal(err.to_string())
    }
}
