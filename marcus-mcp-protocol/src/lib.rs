//! MCP Protocol Implementation
//!
//! Maps decoded MCP tool calls onto `marcus-core` operations and back into
//! wire-shaped JSON. The transport itself (stdio framing, the handshake
//! state machine) lives one layer up in `marcus-mcp-server`; this crate owns
//! everything between "decoded JSON-RPC request" and "marcus-core call".
//!
//! - [`error`] — the JSON-RPC transport error surface
//! - [`serialization`] — wire-shape builders for every tool response
//! - [`request_logger`] — structured single-line call logging
//! - [`dispatcher`] — the Tool Dispatcher itself

pub mod dispatcher;
pub mod error;
pub mod request_logger;
pub mod serialization;

pub use dispatcher::ToolDispatcher;
pub use error::McpError;
pub use request_logger::log_mcp_call;
pub use serialization::{create_null_response, create_success_response, tool_error_result};

pub use marcus_core::{Agent, Assignment, MarcusError, ProjectView, Task, TaskStatus};
