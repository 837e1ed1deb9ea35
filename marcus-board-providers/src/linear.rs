//! Linear board adapter.
//!
//! Linear's GraphQL API exposes a `state` object per issue with a `type`
//! field (`backlog`, `unstarted`, `started`, `completed`, `canceled`) and a
//! separate numeric `priority` (0-4). Both map cleanly onto Marcus's model
//! without the label-guessing the Planka/GitHub adapters need.

use crate::http_retry::with_retry;
use async_trait::async_trait;
use marcus_core::{BoardProvider, BoardSummary, Priority, ProviderError, ProviderResult, Task, TaskDraft, TaskStatus};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Maps a Linear workflow state `type` onto a [`TaskStatus`]. `started` with
/// a name containing "block" is treated as Blocked since Linear has no
/// dedicated blocked state type.
pub fn classify_workflow_state(state_type: &str, state_name: &str) -> TaskStatus {
    match state_type {
        "completed" | "canceled" => TaskStatus::Done,
        "started" if state_name.to_lowercase().contains("block") => TaskStatus::Blocked,
        "started" => TaskStatus::InProgress,
        _ => TaskStatus::Todo,
    }
}

/// Maps Linear's 0-4 numeric priority (0 = no priority, 1 = urgent) onto
/// Marcus's [`Priority`].
pub fn classify_priority(linear_priority: u8) -> Priority {
    match linear_priority {
        1 => Priority::Urgent,
        2 => Priority::High,
        3 => Priority::Medium,
        4 => Priority::Low,
        _ => Priority::Medium,
    }
}

#[derive(Debug, Deserialize)]
struct LinearState {
    #[serde(rename = "type")]
    state_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct LinearLabelNode {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LinearLabelConnection {
    nodes: Vec<LinearLabelNode>,
}

#[derive(Debug, Deserialize)]
struct LinearIssue {
    id: String,
    title: String,
    description: Option<String>,
    priority: u8,
    state: LinearState,
    #[serde(default)]
    labels: Option<LinearLabelConnection>,
    #[serde(rename = "dueDate")]
    due_date: Option<chrono::NaiveDate>,
    #[serde(rename = "createdAt")]
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: chrono::DateTime<chrono::Utc>,
}

/// Adapter talking to the Linear GraphQL API.
pub struct LinearProvider {
    client: reqwest::Client,
    api_key: String,
    team_id: String,
}

impl LinearProvider {
    pub fn new(api_key: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client config is static and valid"),
            api_key: api_key.into(),
            team_id: team_id.into(),
        }
    }

    async fn graphql(&self, query: &str, variables: serde_json::Value) -> ProviderResult<serde_json::Value> {
        with_retry("linear.graphql", || async {
            let resp = self
                .client
                .post("https://api.linear.app/graphql")
                .header("Authorization", &self.api_key)
                .json(&serde_json::json!({ "query": query, "variables": variables }))
                .send()
                .await
                .map_err(|e| ProviderError::Transient(e.to_string()))?;

            let status = resp.status();
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(ProviderError::PermissionDenied(format!("linear rejected credentials: {status}")));
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ProviderError::NotFound(format!("linear returned 404: {status}")));
            }
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(ProviderError::Transient(format!("linear returned {status}")));
            }
            if !status.is_success() {
                return Err(ProviderError::MalformedResponse(format!("linear returned {status}")));
            }

            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
            if let Some(errors) = body.get("errors") {
                return Err(ProviderError::MalformedResponse(format!("linear graphql errors: {errors}")));
            }
            Ok(body)
        })
        .await
    }

    fn issue_to_task(issue: LinearIssue) -> Task {
        let status = classify_workflow_state(&issue.state.state_type, &issue.state.name);
        let priority = classify_priority(issue.priority);
        let labels: BTreeSet<String> = issue
            .labels
            .map(|c| c.nodes.into_iter().map(|n| n.name.to_lowercase()).collect())
            .unwrap_or_default();
        let due_date = issue
            .due_date
            .map(|d| chrono::TimeZone::from_utc_datetime(&chrono::Utc, &d.and_hms_opt(0, 0, 0).expect("midnight is valid")));

        Task {
            id: issue.id,
            name: issue.title,
            description: issue.description.unwrap_or_default(),
            status,
            priority,
            labels,
            dependencies: BTreeSet::new(),
            estimated_hours: 0.0,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            due_date,
        }
    }
}

#[async_trait]
impl BoardProvider for LinearProvider {
    fn name(&self) -> &str {
        "linear"
    }

    async fn list_available_tasks(&self) -> ProviderResult<Vec<Task>> {
        let body = self
            .graphql(
                "query($teamId:String!){ team(id:$teamId) { issues(first:100) { nodes { id title description priority state { type name } labels(first:10){nodes{name}} dueDate createdAt updatedAt } } } }",
                serde_json::json!({ "teamId": self.team_id }),
            )
            .await?;

        let nodes = body
            .pointer("/data/team/issues/nodes")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::MalformedResponse("missing team.issues.nodes".into()))?;

        let mut tasks = Vec::with_capacity(nodes.len());
        for node in nodes {
            let issue: LinearIssue = serde_json::from_value(node.clone())
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
            tasks.push(Self::issue_to_task(issue));
        }
        Ok(tasks)
    }

    async fn get_task(&self, task_id: &str) -> ProviderResult<Task> {
        let body = self
            .graphql(
                "query($id:String!){ issue(id:$id) { id title description priority state { type name } labels(first:10){nodes{name}} dueDate createdAt updatedAt } }",
                serde_json::json!({ "id": task_id }),
            )
            .await?;
        let node = body
            .pointer("/data/issue")
            .filter(|v| !v.is_null())
            .ok_or_else(|| ProviderError::NotFound(task_id.to_string()))?;
        let issue: LinearIssue =
            serde_json::from_value(node.clone()).map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(Self::issue_to_task(issue))
    }

    async fn create_task(&self, draft: TaskDraft) -> ProviderResult<Task> {
        let body = self
            .graphql(
                "mutation($teamId:String!,$title:String!,$description:String!){ issueCreate(input:{teamId:$teamId,title:$title,description:$description}) { issue { id title description priority state { type name } labels(first:10){nodes{name}} dueDate createdAt updatedAt } } }",
                serde_json::json!({ "teamId": self.team_id, "title": draft.name, "description": draft.description }),
            )
            .await?;
        let issue_node = body
            .pointer("/data/issueCreate/issue")
            .ok_or_else(|| ProviderError::MalformedResponse("missing issueCreate.issue".into()))?;
        let issue: LinearIssue = serde_json::from_value(issue_node.clone())
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(Self::issue_to_task(issue))
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> ProviderResult<()> {
        let state_name = match status {
            TaskStatus::Todo => "Todo",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Blocked => "Blocked",
            TaskStatus::Done => "Done",
        };
        self.graphql(
            "mutation($id:String!,$stateName:String!){ issueUpdate(id:$id, input:{stateId:$stateName}) { success } }",
            serde_json::json!({ "id": task_id, "stateName": state_name }),
        )
        .await
        .map(|_| ())
    }

    async fn add_comment(&self, task_id: &str, text: &str) -> ProviderResult<()> {
        self.graphql(
            "mutation($issueId:String!,$body:String!){ commentCreate(input:{issueId:$issueId, body:$body}) { success } }",
            serde_json::json!({ "issueId": task_id, "body": text }),
        )
        .await
        .map(|_| ())
    }

    async fn set_assignee(&self, task_id: &str, agent_id: Option<&str>) -> ProviderResult<()> {
        let text = match agent_id {
            Some(id) => format!("Task assigned to {id} at {}", chrono::Utc::now().to_rfc3339()),
            None => "Task unassigned".to_string(),
        };
        self.add_comment(task_id, &text).await
    }

    async fn get_board_summary(&self) -> ProviderResult<BoardSummary> {
        let tasks = self.list_available_tasks().await?;
        let mut counts_by_status = std::collections::BTreeMap::new();
        for task in &tasks {
            *counts_by_status.entry(task.status.to_string()).or_insert(0) += 1;
        }
        Ok(BoardSummary {
            total_tasks: tasks.len(),
            counts_by_status,
        })
    }
}
