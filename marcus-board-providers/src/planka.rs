//! Planka board adapter.
//!
//! Planka has no native "task status" field — status is *inferred* from
//! which list a card sits in, and priority from a fixed set of label names.
//! This mirrors the list-name substring matching the original kanban
//! integration used (`"progress" in list_name` etc.) rather than anything
//! Planka models natively.

use crate::http_retry::with_retry;
use async_trait::async_trait;
use marcus_core::board_provider::parse_priority_label;
use marcus_core::{BoardProvider, BoardSummary, Priority, ProviderError, ProviderResult, Task, TaskDraft, TaskStatus};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

const DEFAULT_PRIORITY_LABELS: &[(&str, Priority)] = &[
    ("urgent", Priority::Urgent),
    ("high", Priority::High),
    ("low", Priority::Low),
];

/// Maps a Planka list name onto a [`TaskStatus`] by substring, the same way
/// the original kanban integration classified cards: "progress" anywhere in
/// the name means in-progress, "done"/"complete" means done, "blocked" means
/// blocked, everything else is todo.
pub fn classify_list_name(list_name: &str) -> TaskStatus {
    let lower = list_name.to_lowercase();
    if lower.contains("progress") {
        TaskStatus::InProgress
    } else if lower.contains("done") || lower.contains("complete") {
        TaskStatus::Done
    } else if lower.contains("blocked") {
        TaskStatus::Blocked
    } else {
        TaskStatus::Todo
    }
}

#[derive(Debug, Deserialize)]
struct PlankaList {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlankaLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlankaCard {
    id: String,
    name: String,
    description: Option<String>,
    #[serde(rename = "listId")]
    list_id: String,
    #[serde(default)]
    labels: Vec<PlankaLabel>,
    #[serde(rename = "dueDate")]
    due_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "createdAt")]
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    items: Vec<PlankaList>,
}

#[derive(Debug, Deserialize)]
struct CardEnvelope {
    items: Vec<PlankaCard>,
}

/// Adapter talking to a self-hosted Planka instance over its REST API.
pub struct PlankaProvider {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    board_id: String,
}

impl PlankaProvider {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>, board_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client config is static and valid"),
            base_url: base_url.into(),
            api_token: api_token.into(),
            board_id: board_id.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_token)
    }

    async fn lists(&self) -> ProviderResult<Vec<PlankaList>> {
        let resp = self
            .auth(self.client.get(self.url(&format!("/boards/{}/lists", self.board_id))))
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        map_response::<ListEnvelope>(resp).await.map(|e| e.items)
    }

    async fn card_to_task(&self, card: PlankaCard, lists: &[PlankaList]) -> Task {
        let status = lists
            .iter()
            .find(|l| l.id == card.list_id)
            .map(|l| classify_list_name(&l.name))
            .unwrap_or(TaskStatus::Todo);

        let labels: BTreeSet<String> = card.labels.iter().map(|l| l.name.to_lowercase()).collect();
        let priority = parse_priority_label(&labels, DEFAULT_PRIORITY_LABELS);

        Task {
            id: card.id,
            name: card.name,
            description: card.description.unwrap_or_default(),
            status,
            priority,
            labels,
            dependencies: BTreeSet::new(),
            estimated_hours: 0.0,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: card.created_at,
            updated_at: card.updated_at,
            due_date: card.due_date,
        }
    }
}

async fn map_response<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> ProviderResult<T> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(format!("planka returned 404: {status}")));
    }
    if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ProviderError::PermissionDenied(format!("planka auth rejected: {status}")));
    }
    if status == reqwest::StatusCode::CONFLICT {
        return Err(ProviderError::Conflict(format!("planka reported conflict: {status}")));
    }
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::Transient(format!("planka returned {status}")));
    }
    if !status.is_success() {
        return Err(ProviderError::MalformedResponse(format!("planka returned {status}")));
    }
    resp.json::<T>()
        .await
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl BoardProvider for PlankaProvider {
    fn name(&self) -> &str {
        "planka"
    }

    async fn list_available_tasks(&self) -> ProviderResult<Vec<Task>> {
        with_retry("planka.list_available_tasks", || async {
            let lists = self.lists().await?;
            let resp = self
                .auth(self.client.get(self.url(&format!("/boards/{}/cards", self.board_id))))
                .send()
                .await
                .map_err(|e| ProviderError::Transient(e.to_string()))?;
            let cards = map_response::<CardEnvelope>(resp).await?;
            let mut tasks = Vec::with_capacity(cards.items.len());
            for card in cards.items {
                tasks.push(self.card_to_task(card, &lists).await);
            }
            Ok(tasks)
        })
        .await
    }

    async fn get_task(&self, task_id: &str) -> ProviderResult<Task> {
        with_retry("planka.get_task", || async {
            let lists = self.lists().await?;
            let resp = self
                .auth(self.client.get(self.url(&format!("/cards/{task_id}"))))
                .send()
                .await
                .map_err(|e| ProviderError::Transient(e.to_string()))?;
            let card = map_response::<PlankaCard>(resp).await?;
            Ok(self.card_to_task(card, &lists).await)
        })
        .await
    }

    async fn create_task(&self, draft: TaskDraft) -> ProviderResult<Task> {
        with_retry("planka.create_task", || async {
            let lists = self.lists().await?;
            let todo_list = lists
                .iter()
                .find(|l| matches!(l.name.to_uppercase().as_str(), "TODO" | "TO DO" | "BACKLOG"))
                .ok_or_else(|| ProviderError::MalformedResponse("no TODO list found on board".into()))?;

            let resp = self
                .auth(self.client.post(self.url(&format!("/lists/{}/cards", todo_list.id))).json(&serde_json::json!({
                    "name": draft.name,
                    "description": draft.description,
                })))
                .send()
                .await
                .map_err(|e| ProviderError::Transient(e.to_string()))?;
            let card = map_response::<PlankaCard>(resp).await?;
            Ok(self.card_to_task(card, &lists).await)
        })
        .await
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> ProviderResult<()> {
        with_retry("planka.update_status", || async {
            let lists = self.lists().await?;
            let target = lists
                .iter()
                .find(|l| classify_list_name(&l.name) == status)
                .ok_or_else(|| ProviderError::MalformedResponse(format!("no list maps to status {status}")))?;

            let resp = self
                .auth(
                    self.client
                        .patch(self.url(&format!("/cards/{task_id}")))
                        .json(&serde_json::json!({ "listId": target.id })),
                )
                .send()
                .await
                .map_err(|e| ProviderError::Transient(e.to_string()))?;
            map_response::<serde_json::Value>(resp).await.map(|_| ())
        })
        .await
    }

    async fn add_comment(&self, task_id: &str, text: &str) -> ProviderResult<()> {
        with_retry("planka.add_comment", || async {
            let resp = self
                .auth(
                    self.client
                        .post(self.url(&format!("/cards/{task_id}/comments")))
                        .json(&serde_json::json!({ "text": text })),
                )
                .send()
                .await
                .map_err(|e| ProviderError::Transient(e.to_string()))?;
            map_response::<serde_json::Value>(resp).await.map(|_| ())
        })
        .await
    }

    async fn set_assignee(&self, task_id: &str, agent_id: Option<&str>) -> ProviderResult<()> {
        // Planka has no native agent-assignment field usable cross-provider;
        // a comment is the lowest-common-denominator signal.
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
    fn classify_list_name_matches_kanban_substrings() {
        assert_eq!(classify_list_name("In Progress"), TaskStatus::InProgress);
        assert_eq!(classify_list_name("Done"), TaskStatus::Done);
        assert_eq!(classify_list_name("Completed"), TaskStatus::Done);
        assert_eq!(classify_list_name("Blocked"), TaskStatus::Blocked);
        assert_eq!(classify_list_name("Backlog"), TaskStatus::Todo);
    }
}
