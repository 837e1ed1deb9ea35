//! STDIO transport for the MCP server: decodes framed JSON-RPC tool calls
//! from stdin and writes responses to stdout.
//!
//! Line-based JSON-RPC 2.0 over stdin/stdout with a three-state
//! initialize/initialized handshake; once `Ready`, every request is routed
//! straight to [`marcus_mcp_protocol::ToolDispatcher::dispatch`].

use anyhow::{Context, Result};
use marcus_mcp_protocol::{log_mcp_call, McpError, ToolDispatcher};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

/// MCP protocol handshake state.
#[derive(Debug, PartialEq)]
enum McpState {
    WaitingForInitialize,
    WaitingForInitialized,
    Ready,
}

pub struct StdioMcpServer {
    dispatcher: Arc<ToolDispatcher>,
    state: McpState,
}

impl StdioMcpServer {
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            dispatcher,
            state: McpState::WaitingForInitialize,
        }
    }

    /// Runs the line-delimited JSON-RPC loop until stdin closes.
    pub async fn serve(mut self) -> Result<()> {
        info!("starting MCP server in stdio mode, waiting for initialize request");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("stdin closed, shutting down MCP server");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    debug!("received line: {}", trimmed);

                    match self.process_message(trimmed).await {
                        Ok(Some(response)) => {
                            let response_json =
                                serde_json::to_string(&response).context("failed to serialize JSON-RPC response")?;
                            stdout.write_all(response_json.as_bytes()).await.context("failed to write response")?;
                            stdout.write_all(b"\n").await.context("failed to write newline")?;
                            stdout.flush().await.context("failed to flush stdout")?;
                        }
                        Ok(None) => {
                            debug!("processed notification, no response required");
                        }
                        Err(e) => {
                            error!("error processing message: {}", e);
                            let id = extract_id_from_line(trimmed);
                            let error_response = McpError::Internal(e.to_string()).to_json_rpc_error(id);
                            let error_json = serde_json::to_string(&error_response).unwrap_or_else(|_| {
                                r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"internal error"},"id":null}"#.to_string()
                            });
                            let _ = stdout.write_all(error_json.as_bytes()).await;
                            let _ = stdout.write_all(b"\n").await;
                            let _ = stdout.flush().await;
                        }
                    }
                }
                Err(e) => {
                    error!("error reading from stdin: {}", e);
                    break;
                }
            }
        }

        info!("stdio MCP server shutdown complete");
        Ok(())
    }

    async fn process_message(&mut self, line: &str) -> Result<Option<Value>> {
        let message: Value = serde_json::from_str(line).context("failed to parse JSON-RPC message")?;

        if message.get("jsonrpc").and_then(|v| v.as_str()) != Some("2.0") {
            return Err(anyhow::anyhow!("invalid JSON-RPC version"));
        }

        let method = message.get("method").and_then(|v| v.as_str()).context("missing or invalid 'method' field")?;
        let id = message.get("id").cloned();
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let is_notification = id.is_none();

        match (&self.state, method) {
            (McpState::WaitingForInitialize, "initialize") => {
                if is_notification {
                    return Err(anyhow::anyhow!("initialize must be a request, not a notification"));
                }
                info!("received initialize request");
                self.state = McpState::WaitingForInitialized;
                Ok(Some(json!({
                    "jsonrpc": "2.0",
                    "result": {
                        "protocolVersion": "2024-11-05",
                        "capabilities": { "tools": { "listChanged": true } },
                        "serverInfo": {
                            "name": "marcus",
                            "version": env!("CARGO_PKG_VERSION")
                        }
                    },
                    "id": id
                })))
            }

            (McpState::WaitingForInitialized, "notifications/initialized") => {
                if !is_notification {
                    return Err(anyhow::anyhow!("initialized must be a notification, not a request"));
                }
                info!("received initialized notification, server is ready");
                self.state = McpState::Ready;
                Ok(None)
            }

            (McpState::Ready, _) => {
                if is_notification {
                    match method {
                        "notifications/cancelled" => {
                            debug!("received cancelled notification");
                            Ok(None)
                        }
                        _ => {
                            warn!("unknown notification method: {}", method);
                            Ok(None)
                        }
                    }
                } else {
                    let start = Instant::now();
                    let response = if method == "tools/list" {
                        json!({ "jsonrpc": "2.0", "result": tools_list(), "id": id })
                    } else {
                        self.dispatcher.dispatch(method, params.clone(), id.clone()).await
                    };
                    log_mcp_call(method, &params, start.elapsed());
                    Ok(Some(response))
                }
            }

            _ => Err(anyhow::anyhow!("invalid method '{}' for current state {:?}", method, self.state)),
        }
    }
}

fn extract_id_from_line(line: &str) -> Option<Value> {
    serde_json::from_str::<Value>(line).ok().and_then(|v| v.get("id").cloned())
}

/// The `tools/list` response: the eight tools the dispatcher routes, with
/// the request schema each one's dispatcher arm deserializes.
fn tools_list() -> Value {
    json!({
        "tools": [
            {
                "name": "register_agent",
                "description": "Register an autonomous agent or update its profile",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "agent_id": {"type": "string"},
                        "name": {"type": "string"},
                        "role": {"type": "string"},
                        "skills": {"type": "array", "items": {"type": "string"}},
                        "capacity": {"type": "integer"}
                    },
                    "required": ["agent_id", "name", "role"]
                }
            },
            {
                "name": "request_next_task",
                "description": "Request the best available task for an agent",
                "inputSchema": {
                    "type": "object",
                    "properties": { "agent_id": {"type": "string"} },
                    "required": ["agent_id"]
                }
            },
            {
                "name": "report_task_progress",
                "description": "Report progress or completion on an assigned task",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "agent_id": {"type": "string"},
                        "task_id": {"type": "string"},
                        "status": {"type": "string"},
                        "progress": {"type": "integer", "minimum": 0, "maximum": 100},
                        "message": {"type": "string"}
                    },
                    "required": ["agent_id", "task_id", "status", "progress"]
                }
            },
            {
                "name": "report_blocker",
                "description": "Report a blocker on an assigned task",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "agent_id": {"type": "string"},
                        "task_id": {"type": "string"},
                        "blocker_description": {"type": "string"},
                        "severity": {"type": "string", "enum": ["low", "medium", "high"]}
                    },
                    "required": ["agent_id", "task_id", "blocker_description", "severity"]
                }
            },
            {
                "name": "get_project_status",
                "description": "Get aggregate project metrics",
                "inputSchema": { "type": "object" }
            },
            {
                "name": "create_project_from_description",
                "description": "Create a project's tasks from a natural-language description",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "description": {"type": "string"},
                        "project_name": {"type": "string"},
                        "options": {"type": "object"}
                    },
                    "required": ["description", "project_name"]
                }
            },
            {
                "name": "add_feature",
                "description": "Add a feature's tasks to an existing project",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "description": {"type": "string"},
                        "integration_point": {"type": "string"}
                    },
                    "required": ["description"]
                }
            },
            {
                "name": "refresh_project_state",
                "description": "Pull the board provider's state and reconcile it with the internal task store",
                "inputSchema": { "type": "object" }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marcus_board_providers::InMemoryBoardProvider;
    use marcus_core::advisor::FallbackAdvisor;
    use marcus_core::assignment::AssignmentEngine;
    use marcus_core::progress::ProgressHandler;
    use marcus_core::reconciliation::PushRetryQueue;
    use marcus_core::store::TaskStore;
    use std::time::Duration;

    fn dispatcher() -> Arc<ToolDispatcher> {
        let store = Arc::new(TaskStore::new());
        let provider: Arc<dyn marcus_core::board_provider::BoardProvider> = Arc::new(InMemoryBoardProvider::new());
        let advisor: Arc<dyn marcus_core::advisor::AiAdvisor> = Arc::new(FallbackAdvisor);
        let push_retry = Arc::new(PushRetryQueue::new(3));
        let lifecycle = Arc::new(marcus_core::lifecycle::LifecycleStateMachine::new(
            store.clone(),
            provider.clone(),
            push_retry.clone(),
        ));
        let assignment = Arc::new(AssignmentEngine::new(store.clone(), provider.clone(), advisor.clone(), push_retry.clone(), 3));
        let progress = Arc::new(ProgressHandler::new(store.clone(), lifecycle, provider.clone(), advisor));
        Arc::new(ToolDispatcher::new(store, provider, assignment, progress, push_retry, Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn handshake_transitions_through_states() {
        let mut server = StdioMcpServer::new(dispatcher());
        assert_eq!(server.state, McpState::WaitingForInitialize);

        let init = json!({"jsonrpc": "2.0", "method": "initialize", "params": {}, "id": 1});
        let response = server.process_message(&init.to_string()).await.unwrap();
        assert!(response.is_some());
        assert_eq!(server.state, McpState::WaitingForInitialized);

        let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let response = server.process_message(&initialized.to_string()).await.unwrap();
        assert!(response.is_none());
        assert_eq!(server.state, McpState::Ready);
    }

    #[tokio::test]
    async fn tool_call_before_handshake_is_rejected() {
        let mut server = StdioMcpServer::new(dispatcher());
        let call = json!({"jsonrpc": "2.0", "method": "get_project_status", "params": {}, "id": 1});
        assert!(server.process_message(&call.to_string()).await.is_err());
    }

    #[tokio::test]
    async fn tools_list_is_served_once_ready() {
        let mut server = StdioMcpServer::new(dispatcher());
        server.state = McpState::Ready;
        let call = json!({"jsonrpc": "2.0", "method": "tools/list", "params": {}, "id": 1});
        let response = server.process_message(&call.to_string()).await.unwrap().unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 8);
    }

    #[tokio::test]
    async fn register_agent_round_trips_through_dispatch() {
        let mut server = StdioMcpServer::new(dispatcher());
        server.state = McpState::Ready;
        let call = json!({
            "jsonrpc": "2.0",
            "method": "register_agent",
            "params": {"agent_id": "a1", "name": "Agent One", "role": "coder", "skills": ["rust"]},
            "id": 2
        });
        let response = server.process_message(&call.to_string()).await.unwrap().unwrap();
        assert_eq!(response["result"]["success"], true);
        assert_eq!(response["result"]["agent_id"], "a1");
    }
}
