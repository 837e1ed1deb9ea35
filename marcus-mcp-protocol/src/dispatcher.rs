//! Tool Dispatcher: maps the eight MCP tool calls onto marcus-core
//! operations, validates required fields, applies a per-call deadline, and
//! serializes results with [`crate::serialization`].
//!
//! Shaped after a dispatch-by-method-name `route_method`: one `match` arm
//! per tool name, against Marcus's components instead of a `TaskRepository`.

use crate::error::McpError;
use crate::serialization::{
    batch_upsert_result, create_null_response, create_success_response, deserialize_mcp_params,
    no_task_available_result, project_status_result, refresh_result, register_agent_result,
    report_blocker_result, report_progress_result, request_next_task_result, tool_error_result,
};
use chrono::Utc;
use marcus_core::assignment::RequestOutcome;
use marcus_core::board_provider::BoardProvider;
use marcus_core::error::MarcusError;
use marcus_core::models::{Agent, Priority, Severity, TaskDraft};
use marcus_core::monitor::{get_project_status, refresh_and_get_status};
use marcus_core::reconciliation::PushRetryQueue;
use marcus_core::store::TaskStore;
use marcus_core::{AssignmentEngine, ProgressHandler};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// The eight tool names the dispatcher will route; anything else is a
/// transport-level `MethodNotFound`.
const TOOL_NAMES: &[&str] = &[
    "register_agent",
    "request_next_task",
    "report_task_progress",
    "report_blocker",
    "get_project_status",
    "create_project_from_description",
    "add_feature",
    "refresh_project_state",
];

pub fn is_known_tool(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

#[derive(Debug, Deserialize)]
struct RegisterAgentParams {
    agent_id: String,
    name: String,
    role: String,
    #[serde(default)]
    skills: Vec<String>,
    capacity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RequestNextTaskParams {
    agent_id: String,
}

#[derive(Debug, Deserialize)]
struct ReportTaskProgressParams {
    agent_id: String,
    task_id: String,
    status: String,
    progress: u8,
    message: Option<String>,
    actual_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReportBlockerParams {
    agent_id: String,
    task_id: String,
    blocker_description: String,
    severity: String,
}

#[derive(Debug, Deserialize)]
struct CreateProjectParams {
    description: String,
    #[serde(default)]
    project_name: String,
    #[allow(dead_code)]
    options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AddFeatureParams {
    description: String,
    #[allow(dead_code)]
    integration_point: Option<String>,
}

fn parse_severity(raw: &str) -> Result<Severity, McpError> {
    match raw {
        "low" => Ok(Severity::Low),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        other => Err(McpError::InvalidParams(format!("unknown severity: {other}"))),
    }
}

/// Splits free-form text into one [`TaskDraft`] per non-empty line, the
/// simplest stand-in for a natural-language project/feature generator, which
/// is treated as an external collaborator out of scope here. Each draft
/// after the first depends on the one before it, since a description's
/// lines are usually an ordered plan rather than independent work.
fn drafts_from_description(description: &str, label: &str) -> Vec<TaskDraft> {
    let lines: Vec<&str> = description
        .lines()
        .map(|l| l.trim().trim_start_matches(['-', '*']).trim())
        .filter(|l| !l.is_empty())
        .collect();
    let lines = if lines.is_empty() { vec![description.trim()] } else { lines };

    lines
        .into_iter()
        .map(|line| TaskDraft {
            name: line.to_string(),
            description: line.to_string(),
            labels: [label.to_string()].into_iter().collect(),
            priority: Priority::Medium,
            estimated_hours: 0.0,
            dependencies: Vec::new(),
        })
        .collect()
}

/// Wires the per-component collaborators the dispatcher routes calls to.
pub struct ToolDispatcher {
    store: Arc<TaskStore>,
    provider: Arc<dyn BoardProvider>,
    assignment: Arc<AssignmentEngine>,
    progress: Arc<ProgressHandler>,
    push_retry: Arc<PushRetryQueue>,
    deadline: Duration,
}

impl ToolDispatcher {
    pub fn new(
        store: Arc<TaskStore>,
        provider: Arc<dyn BoardProvider>,
        assignment: Arc<AssignmentEngine>,
        progress: Arc<ProgressHandler>,
        push_retry: Arc<PushRetryQueue>,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            assignment,
            progress,
            push_retry,
            deadline,
        }
    }

    /// Dispatch one decoded JSON-RPC request body. `id` is echoed back
    /// verbatim in the response envelope.
    pub async fn dispatch(&self, method: &str, params: Value, id: Option<Value>) -> Value {
        if !is_known_tool(method) {
            return McpError::MethodNotFound(method.to_string()).to_json_rpc_error(id);
        }

        match tokio::time::timeout(self.deadline, self.route(method, params)).await {
            Ok(Ok(result)) => create_success_response(id, result),
            Ok(Err(McpError::InvalidParams(msg))) => {
                McpError::InvalidParams(msg).to_json_rpc_error(id)
            }
            Ok(Err(e)) => e.to_json_rpc_error(id),
            Err(_) => {
                let err = MarcusError::Timeout(format!("{method} exceeded {:?} deadline", self.deadline));
                create_success_response(id, tool_error_result(&err))
            }
        }
    }

    async fn route(&self, method: &str, params: Value) -> Result<Value, McpError> {
        match method {
            "register_agent" => self.register_agent(params).await,
            "request_next_task" => self.request_next_task(params).await,
            "report_task_progress" => self.report_task_progress(params).await,
            "report_blocker" => self.report_blocker(params).await,
            "get_project_status" => self.get_project_status(params).await,
            "create_project_from_description" => self.create_project_from_description(params).await,
            "add_feature" => self.add_feature(params).await,
            "refresh_project_state" => self.refresh_project_state(params).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    async fn register_agent(&self, params: Value) -> Result<Value, McpError> {
        let p: RegisterAgentParams = deserialize_mcp_params(params)?;
        if p.agent_id.trim().is_empty() {
            return Err(McpError::InvalidParams("agent_id cannot be empty".into()));
        }
        let mut agent = Agent::new(p.agent_id.clone(), p.name, p.role, p.skills);
        if let Some(capacity) = p.capacity {
            agent.capacity = capacity;
        }
        match self.store.upsert_agent(agent) {
            Ok(()) => {
                let agent = self.store.get_agent(&p.agent_id).expect("just upserted");
                Ok(register_agent_result(&agent))
            }
            Err(e) => Ok(tool_error_result(&e)),
        }
    }

    async fn request_next_task(&self, params: Value) -> Result<Value, McpError> {
        let p: RequestNextTaskParams = deserialize_mcp_params(params)?;
        match self.assignment.request_next_task(&p.agent_id).await {
            Ok(RequestOutcome::Assigned(assignment)) => {
                let task = self
                    .store
                    .get_task(&assignment.task_id)
                    .ok_or_else(|| McpError::Internal("assigned task vanished from store".into()))?;
                Ok(request_next_task_result(Some((&task, &assignment))))
            }
            Ok(RequestOutcome::NoTaskAvailable(reason)) => Ok(no_task_available_result(reason.as_str())),
            Err(e) => Ok(tool_error_result(&e)),
        }
    }

    async fn report_task_progress(&self, params: Value) -> Result<Value, McpError> {
        let p: ReportTaskProgressParams = deserialize_mcp_params(params)?;
        match self
            .progress
            .report_progress(&p.agent_id, &p.task_id, &p.status, p.progress, p.message.as_deref(), p.actual_hours)
            .await
        {
            Ok(outcome) => Ok(report_progress_result(true, &outcome.task.status.to_string())),
            Err(e) => Ok(tool_error_result(&e)),
        }
    }

    async fn report_blocker(&self, params: Value) -> Result<Value, McpError> {
        let p: ReportBlockerParams = deserialize_mcp_params(params)?;
        let severity = parse_severity(&p.severity)?;
        let blocker_id = format!("blk-{}-{}", p.task_id, Utc::now().timestamp_millis());
        match self
            .progress
            .report_blocker(&p.agent_id, &p.task_id, &p.blocker_description, severity, blocker_id)
            .await
        {
            Ok(blocker) => Ok(report_blocker_result(&blocker.id, &blocker.suggestions)),
            Err(e) => Ok(tool_error_result(&e)),
        }
    }

    async fn get_project_status(&self, _params: Value) -> Result<Value, McpError> {
        let view = get_project_status(&self.store);
        Ok(project_status_result(&view, self.provider.name()))
    }

    async fn create_project_from_description(&self, params: Value) -> Result<Value, McpError> {
        let p: CreateProjectParams = deserialize_mcp_params(params)?;
        if p.description.trim().is_empty() {
            return Err(McpError::InvalidParams("description cannot be empty".into()));
        }
        let label = if p.project_name.trim().is_empty() { "project".to_string() } else { p.project_name };
        let drafts = drafts_from_description(&p.description, &label);
        self.create_tasks_chained(drafts).await
    }

    async fn add_feature(&self, params: Value) -> Result<Value, McpError> {
        let p: AddFeatureParams = deserialize_mcp_params(params)?;
        if p.description.trim().is_empty() {
            return Err(McpError::InvalidParams("description cannot be empty".into()));
        }
        let drafts = drafts_from_description(&p.description, "feature");
        self.create_tasks_chained(drafts).await
    }

    /// Creates each draft through the provider in order, chaining
    /// `dependencies` onto the previously created task's id, then upserts the
    /// resulting tasks into the store. A provider failure partway through
    /// surfaces as a fatal error with whatever was created so far logged,
    /// since the store must never hold a task the provider doesn't know
    /// about — the provider is the source of truth for task ids.
    async fn create_tasks_chained(&self, mut drafts: Vec<TaskDraft>) -> Result<Value, McpError> {
        let mut task_ids = Vec::with_capacity(drafts.len());
        let mut previous_id: Option<String> = None;

        for draft in drafts.drain(..) {
            let mut draft = draft;
            if let Some(prev) = &previous_id {
                draft.dependencies.push(prev.clone());
            }
            let task = match self.provider.create_task(draft).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, created_so_far = task_ids.len(), "task batch creation failed partway through");
                    let err = MarcusError::ProviderFatal(e.to_string());
                    return Ok(tool_error_result(&err));
                }
            };
            if let Err(e) = self.store.upsert_task(task.clone()) {
                return Ok(tool_error_result(&e));
            }
            previous_id = Some(task.id.clone());
            task_ids.push(task.id);
        }

        Ok(batch_upsert_result(&task_ids))
    }

    async fn refresh_project_state(&self, _params: Value) -> Result<Value, McpError> {
        self.push_retry.drain_once(self.provider.as_ref()).await;
        match refresh_and_get_status(&self.store, self.provider.as_ref()).await {
            Ok(_) => Ok(refresh_result(true)),
            Err(e) => Ok(tool_error_result(&e)),
        }
    }
}

/// Builds the transport-level `null`-id notification response used only for
/// the `initialized` notification; kept here since the dispatcher owns the
/// response envelope helpers used throughout the stdio loop.
pub fn notification_ack(id: Option<Value>) -> Value {
    create_null_response(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marcus_core::advisor::FallbackAdvisor;
    use marcus_core::lifecycle::LifecycleStateMachine;
    use marcus_core::models::{Task, TaskStatus};
    use serde_json::json;
    use std::collections::BTreeSet;

    struct StubProvider;

    #[async_trait::async_trait]
    impl BoardProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        async fn list_available_tasks(&self) -> marcus_core::board_provider::ProviderResult<Vec<Task>> {
            Ok(vec![])
        }
        async fn get_task(&self, task_id: &str) -> marcus_core::board_provider::ProviderResult<Task> {
            Err(marcus_core::board_provider::ProviderError::NotFound(task_id.to_string()))
        }
        async fn create_task(&self, draft: TaskDraft) -> marcus_core::board_provider::ProviderResult<Task> {
            Ok(Task {
                id: format!("generated-{}", draft.name.len()),
                name: draft.name,
                description: draft.description,
                status: TaskStatus::Todo,
                priority: draft.priority,
                labels: draft.labels,
                dependencies: draft.dependencies.into_iter().collect::<BTreeSet<_>>(),
                estimated_hours: draft.estimated_hours,
                actual_hours: 0.0,
                assigned_to: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                due_date: None,
            })
        }
        async fn update_status(&self, _task_id: &str, _status: TaskStatus) -> marcus_core::board_provider::ProviderResult<()> {
            Ok(())
        }
        async fn add_comment(&self, _task_id: &str, _text: &str) -> marcus_core::board_provider::ProviderResult<()> {
            Ok(())
        }
        async fn set_assignee(&self, _task_id: &str, _agent_id: Option<&str>) -> marcus_core::board_provider::ProviderResult<()> {
            Ok(())
        }
        async fn get_board_summary(&self) -> marcus_core::board_provider::ProviderResult<marcus_core::board_provider::BoardSummary> {
            Ok(marcus_core::board_provider::BoardSummary::default())
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let store = Arc::new(TaskStore::new());
        let provider: Arc<dyn BoardProvider> = Arc::new(StubProvider);
        let push_retry = Arc::new(PushRetryQueue::new(5));
        let advisor = Arc::new(FallbackAdvisor);
        let lifecycle = Arc::new(LifecycleStateMachine::new(store.clone(), provider.clone(), push_retry.clone()));
        let assignment = Arc::new(AssignmentEngine::new(store.clone(), provider.clone(), advisor.clone(), push_retry.clone(), 3));
        let progress = Arc::new(ProgressHandler::new(store.clone(), lifecycle, provider.clone(), advisor));
        ToolDispatcher::new(store, provider, assignment, progress, push_retry, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let d = dispatcher();
        let resp = d.dispatch("bogus_tool", json!({}), Some(json!(1))).await;
        assert_eq!(resp["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn register_agent_round_trips() {
        let d = dispatcher();
        let resp = d
            .dispatch(
                "register_agent",
                json!({"agent_id": "a1", "name": "Agent One", "role": "coder", "skills": ["rust"]}),
                Some(json!(1)),
            )
            .await;
        assert_eq!(resp["result"]["success"], true);
        assert_eq!(resp["result"]["agent_id"], "a1");
    }

    #[tokio::test]
    async fn register_agent_rejects_empty_id() {
        let d = dispatcher();
        let resp = d
            .dispatch("register_agent", json!({"agent_id": "", "name": "x", "role": "coder"}), Some(json!(1)))
            .await;
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn request_next_task_with_no_tasks_reports_no_task() {
        let d = dispatcher();
        d.dispatch("register_agent", json!({"agent_id": "a1", "name": "x", "role": "coder"}), Some(json!(1)))
            .await;
        let resp = d.dispatch("request_next_task", json!({"agent_id": "a1"}), Some(json!(2))).await;
        assert_eq!(resp["result"]["has_task"], false);
        assert_eq!(resp["result"]["reason"], "no_task");
    }

    #[tokio::test]
    async fn create_project_from_description_splits_lines_into_chained_tasks() {
        let d = dispatcher();
        let resp = d
            .dispatch(
                "create_project_from_description",
                json!({"description": "set up schema\nwire the API\nwrite tests", "project_name": "demo"}),
                Some(json!(1)),
            )
            .await;
        assert_eq!(resp["result"]["success"], true);
        assert_eq!(resp["result"]["tasks_created"], 3);
    }

    #[tokio::test]
    async fn get_project_status_reports_provider_name() {
        let d = dispatcher();
        let resp = d.dispatch("get_project_status", json!({}), Some(json!(1))).await;
        assert_eq!(resp["result"]["provider"], "stub");
    }
}
