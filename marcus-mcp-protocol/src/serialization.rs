//! Wire-shape conversions for MCP responses.
//!
//! Every tool response here is a plain `serde_json::Value` built by hand
//! rather than derived from a `Serialize` struct, matching how a
//! `serialize_task_for_mcp` shapes a response independent of the internal
//! struct layout — the wire contract and the Rust struct are allowed to
//! diverge, and here they do (`Task` carries far more than the wire's
//! `request_next_task` summary).

use crate::error::McpError;
use marcus_core::{Agent, Assignment, MarcusError, ProjectView, Task};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn deserialize_mcp_params<T>(params: Value) -> Result<T, McpError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

pub fn create_success_response(id: Option<Value>, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
}

pub fn create_null_response(id: Option<Value>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": null,
        "id": id
    })
}

/// The uniform business-failure shape every tool call falls back to: still
/// a successful JSON-RPC response, since the transport itself didn't fail.
pub fn tool_error_result(err: &MarcusError) -> Value {
    json!({
        "success": false,
        "error_kind": err.kind(),
        "message": err.to_string()
    })
}

pub fn register_agent_result(agent: &Agent) -> Value {
    json!({
        "success": true,
        "agent_id": agent.id
    })
}

/// `request_next_task`'s response: a task *summary*, not the full `Task` —
/// the agent only needs enough to start working.
pub fn request_next_task_result(assignment: Option<(&Task, &Assignment)>) -> Value {
    match assignment {
        Some((task, assignment)) => json!({
            "has_task": true,
            "task": {
                "id": task.id,
                "name": task.name,
                "description": task.description,
                "priority": task.priority,
                "estimated_hours": task.estimated_hours,
                "instructions": assignment.instructions,
                "deadline": assignment.deadline.map(|d| d.to_rfc3339()),
            }
        }),
        None => json!({ "has_task": false }),
    }
}

pub fn no_task_available_result(reason: &str) -> Value {
    json!({ "has_task": false, "reason": reason })
}

pub fn report_progress_result(acknowledged: bool, new_status: &str) -> Value {
    json!({
        "acknowledged": acknowledged,
        "new_status": new_status
    })
}

pub fn report_blocker_result(blocker_id: &str, suggestions: &[String]) -> Value {
    json!({
        "success": true,
        "suggestions": suggestions,
        "blocker_id": blocker_id
    })
}

pub fn project_status_result(view: &ProjectView, provider_name: &str) -> Value {
    json!({
        "counts": view.counts_by_status,
        "completion_percentage": view.completion_percentage,
        "workers": view.workload_by_agent,
        "provider": provider_name
    })
}

pub fn batch_upsert_result(task_ids: &[String]) -> Value {
    json!({
        "success": true,
        "tasks_created": task_ids.len(),
        "task_ids": task_ids
    })
}

pub fn refresh_result(success: bool) -> Value {
    json!({ "success": success })
}

/// Full task serialization, used by tests and any future status/debug tool
/// that wants the complete internal record rather than a tool-specific
/// summary.
pub fn serialize_task_for_mcp(task: &Task) -> Value {
    json!({
        "id": task.id,
        "name": task.name,
        "description": task.description,
        "status": task.status,
        "priority": task.priority,
        "labels": task.labels,
        "dependencies": task.dependencies,
        "estimated_hours": task.estimated_hours,
        "actual_hours": task.actual_hours,
        "assigned_to": task.assigned_to,
        "created_at": task.created_at.to_rfc3339(),
        "updated_at": task.updated_at.to_rfc3339(),
        "due_date": task.due_date.map(|d| d.to_rfc3339()),
    })
}
