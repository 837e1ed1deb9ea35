//! GitHub Projects (v2) board adapter.
//!
//! Status lives in the project's single-select "Status" field; priority and
//! everything else is carried on issue labels, the same label-driven pattern
//! as the Planka adapter: each adapter owns its own mapping table, the core
//! never sees GitHub's GraphQL shapes.

use crate::http_retry::with_retry;
use async_trait::async_trait;
use marcus_core::board_provider::parse_priority_label;
use marcus_core::{BoardProvider, BoardSummary, Priority, ProviderError, ProviderResult, Task, TaskDraft, TaskStatus};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

const DEFAULT_PRIORITY_LABELS: &[(&str, Priority)] = &[
    ("priority: urgent", Priority::Urgent),
    ("priority: high", Priority::High),
    ("priority: low", Priority::Low),
];

/// Maps a GitHub Project "Status" single-select option onto a [`TaskStatus`].
pub fn classify_status_option(option_name: &str) -> TaskStatus {
    match option_name.to_lowercase().as_str() {
        "in progress" | "in-progress" => TaskStatus::InProgress,
        "done" => TaskStatus::Done,
        "blocked" => TaskStatus::Blocked,
        _ => TaskStatus::Todo,
    }
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    id: String,
    title: String,
    body: Option<String>,
    #[serde(default)]
    labels: Vec<GhLabel>,
    status: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: chrono::DateTime<chrono::Utc>,
}

/// Adapter talking to the GitHub GraphQL API (Projects v2 + Issues).
pub struct GitHubProjectsProvider {
    client: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    project_number: u32,
}

impl GitHubProjectsProvider {
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>, project_number: u32) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent("marcus-mcp-server")
                .build()
                .expect("reqwest client config is static and valid"),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            project_number,
        }
    }

    async fn graphql(&self, query: &str, variables: serde_json::Value) -> ProviderResult<serde_json::Value> {
        with_retry("github.graphql", || async {
            let resp = self
                .client
                .post("https://api.github.com/graphql")
                .bearer_auth(&self.token)
                .json(&serde_json::json!({ "query": query, "variables": variables }))
                .send()
                .await
                .map_err(|e| ProviderError::Transient(e.to_string()))?;

            let status = resp.status();
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(ProviderError::PermissionDenied(format!("github rejected credentials: {status}")));
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ProviderError::NotFound(format!("github returned 404: {status}")));
            }
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(ProviderError::Transient(format!("github returned {status}")));
            }
            if !status.is_success() {
                return Err(ProviderError::MalformedResponse(format!("github returned {status}")));
            }

            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
            if let Some(errors) = body.get("errors") {
                return Err(ProviderError::MalformedResponse(format!("github graphql errors: {errors}")));
            }
            Ok(body)
        })
        .await
    }

    fn issue_to_task(issue: GhIssue) -> Task {
        let status = issue
            .status
            .as_deref()
            .map(classify_status_option)
            .unwrap_or(TaskStatus::Todo);
        let labels: BTreeSet<String> = issue.labels.iter().map(|l| l.name.to_lowercase()).collect();
        let priority = parse_priority_label(&labels, DEFAULT_PRIORITY_LABELS);

        Task {
            id: issue.id,
            name: issue.title,
            description: issue.body.unwrap_or_default(),
            status,
            priority,
            labels,
            dependencies: BTreeSet::new(),
            estimated_hours: 0.0,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            due_date: None,
        }
    }
}

#[async_trait]
impl BoardProvider for GitHubProjectsProvider {
    fn name(&self) -> &str {
        "github"
    }

    async fn list_available_tasks(&self) -> ProviderResult<Vec<Task>> {
        let body = self
            .graphql(
                "query($owner:String!,$repo:String!){ repository(owner:$owner, name:$repo) { issues(states:OPEN, first:100) { nodes { id title body labels(first:10){nodes{name}} createdAt updatedAt } } } }",
                serde_json::json!({ "owner": self.owner, "repo": self.repo }),
            )
            .await?;

        let nodes = body
            .pointer("/data/repository/issues/nodes")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::MalformedResponse("missing issues.nodes".into()))?;

        let mut tasks = Vec::with_capacity(nodes.len());
        for node in nodes {
            let issue: GhIssue = serde_json::from_value(node.clone())
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
            tasks.push(Self::issue_to_task(issue));
        }
        Ok(tasks)
    }

    async fn get_task(&self, task_id: &str) -> ProviderResult<Task> {
        let body = self
            .graphql(
                "query($id:ID!){ node(id:$id) { ... on Issue { id title body labels(first:10){nodes{name}} createdAt updatedAt } } }",
                serde_json::json!({ "id": task_id }),
            )
            .await?;
        let node = body
            .pointer("/data/node")
            .filter(|v| !v.is_null())
            .ok_or_else(|| ProviderError::NotFound(task_id.to_string()))?;
        let issue: GhIssue =
            serde_json::from_value(node.clone()).map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(Self::issue_to_task(issue))
    }

    async fn create_task(&self, draft: TaskDraft) -> ProviderResult<Task> {
        let body = self
            .graphql(
                "mutation($owner:String!,$repo:String!,$title:String!,$body:String!){ createIssue(input:{repositoryId:$owner,title:$title,body:$body}) { issue { id title body labels(first:10){nodes{name}} createdAt updatedAt } } }",
                serde_json::json!({ "owner": self.owner, "repo": self.repo, "title": draft.name, "body": draft.description }),
            )
            .await?;
        let issue_node = body
            .pointer("/data/createIssue/issue")
            .ok_or_else(|| ProviderError::MalformedResponse("missing createIssue.issue".into()))?;
        let issue: GhIssue = serde_json::from_value(issue_node.clone())
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(Self::issue_to_task(issue))
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> ProviderResult<()> {
        let option_name = match status {
            TaskStatus::Todo => "Todo",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Blocked => "Blocked",
            TaskStatus::Done => "Done",
        };
        self.graphql(
            "mutation($project:Int!,$item:ID!,$option:String!){ updateProjectV2ItemFieldValue(input:{projectId:$project,itemId:$item,value:{singleSelectOptionId:$option}}) { clientMutationId } }",
            serde_json::json!({ "project": self.project_number, "item": task_id, "option": option_name }),
        )
        .await
        .map(|_| ())
    }

    async fn add_comment(&self, task_id: &str, text: &str) -> ProviderResult<()> {
        self.graphql(
            "mutation($id:ID!,$body:String!){ addComment(input:{subjectId:$id, body:$body}) { clientMutationId } }",
            serde_json::json!({ "id": task_id, "body": text }),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_status_option_maps_known_columns() {
        assert_eq!(classify_status_option("In Progress"), TaskStatus::InProgress);
        assert_eq!(classify_status_option("Done"), TaskStatus::Done);
        assert_eq!(classify_status_option("Blocked"), TaskStatus::Blocked);
        assert_eq!(classify_status_option("Todo"), TaskStatus::Todo);
        assert_eq!(classify_status_option("Icebox"), TaskStatus::Todo);
    }
}
