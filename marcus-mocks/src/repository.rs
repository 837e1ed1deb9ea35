//! Hand-rolled test doubles for [`BoardProvider`] and [`AiAdvisor`].
//!
//! `marcus-board-providers::InMemoryBoardProvider` already gives a faithful
//! full-contract stand-in; these doubles exist for the narrower case of
//! scripting exact per-method failures and call counts in a single test
//! without routing through the full in-memory state machine.

use async_trait::async_trait;
use chrono::Utc;
use marcus_core::{
    Agent, AiAdvisor, BoardProvider, BoardSummary, ProviderError, ProviderResult, Severity, Task,
    TaskDraft, TaskStatus,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A [`BoardProvider`] double whose tasks, per-method forced errors, and
/// per-method call counts are all set up directly by the test.
#[derive(Default)]
pub struct MockBoardProvider {
    tasks: Mutex<HashMap<String, Task>>,
    comments: Mutex<HashMap<String, Vec<String>>>,
    call_counts: Mutex<HashMap<&'static str, u32>>,
    forced_errors: Mutex<HashMap<&'static str, ProviderError>>,
}

impl MockBoardProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(self, task: Task) -> Self {
        self.tasks.lock().insert(task.id.clone(), task);
        self
    }

    /// Every call to `method` fails with a clone of `error` until cleared.
    pub fn force_error(&self, method: &'static str, error: ProviderError) {
        self.forced_errors.lock().insert(method, error);
    }

    pub fn clear_forced_error(&self, method: &'static str) {
        self.forced_errors.lock().remove(method);
    }

    pub fn call_count(&self, method: &'static str) -> u32 {
        self.call_counts.lock().get(method).copied().unwrap_or(0)
    }

    pub fn comments_for(&self, task_id: &str) -> Vec<String> {
        self.comments.lock().get(task_id).cloned().unwrap_or_default()
    }

    fn record(&self, method: &'static str) -> ProviderResult<()> {
        *self.call_counts.lock().entry(method).or_insert(0) += 1;
        match self.forced_errors.lock().get(method) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BoardProvider for MockBoardProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_available_tasks(&self) -> ProviderResult<Vec<Task>> {
        self.record("list_available_tasks")?;
        Ok(self.tasks.lock().values().cloned().collect())
    }

    async fn get_task(&self, task_id: &str) -> ProviderResult<Task> {
        self.record("get_task")?;
        self.tasks.lock().get(task_id).cloned().ok_or_else(|| ProviderError::NotFound(task_id.to_string()))
    }

    async fn create_task(&self, draft: TaskDraft) -> ProviderResult<Task> {
        self.record("create_task")?;
        let id = format!("mock-{}", self.tasks.lock().len() + 1);
        let now = Utc::now();
        let task = Task {
            id: id.clone(),
            name: draft.name,
            description: draft.description,
            status: TaskStatus::Todo,
            priority: draft.priority,
            labels: draft.labels,
            dependencies: draft.dependencies.into_iter().collect(),
            estimated_hours: draft.estimated_hours,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            due_date: None,
        };
        self.tasks.lock().insert(id, task.clone());
        Ok(task)
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> ProviderResult<()> {
        self.record("update_status")?;
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(task_id).ok_or_else(|| ProviderError::NotFound(task_id.to_string()))?;
        task.status = status;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn add_comment(&self, task_id: &str, text: &str) -> ProviderResult<()> {
        self.record("add_comment")?;
        self.comments.lock().entry(task_id.to_string()).or_default().push(text.to_string());
        Ok(())
    }

    async fn set_assignee(&self, _task_id: &str, _agent_id: Option<&str>) -> ProviderResult<()> {
        self.record("set_assignee")
    }

    async fn get_board_summary(&self) -> ProviderResult<BoardSummary> {
        self.record("get_board_summary")?;
        let tasks = self.tasks.lock();
        let mut counts_by_status = std::collections::BTreeMap::new();
        for task in tasks.values() {
            *counts_by_status.entry(task.status.to_string()).or_insert(0) += 1;
        }
        Ok(BoardSummary {
            total_tasks: tasks.len(),
            counts_by_status,
        })
    }
}

/// An [`AiAdvisor`] double that returns scripted responses, optionally after
/// an artificial delay — used to exercise the deadline/fallback path without
/// a real multi-second sleep.
pub struct MockAiAdvisor {
    instructions: Mutex<Option<String>>,
    suggestions: Mutex<Option<Vec<String>>>,
    delay: Mutex<Option<Duration>>,
    call_count: AtomicUsize,
}

impl Default for MockAiAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAiAdvisor {
    pub fn new() -> Self {
        Self {
            instructions: Mutex::new(Some("mock instructions".to_string())),
            suggestions: Mutex::new(Some(vec!["mock suggestion".to_string()])),
            delay: Mutex::new(None),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_instructions(self, instructions: impl Into<String>) -> Self {
        *self.instructions.lock() = Some(instructions.into());
        self
    }

    pub fn with_suggestions(self, suggestions: Vec<String>) -> Self {
        *self.suggestions.lock() = Some(suggestions);
        self
    }

    /// Takes far longer than any reasonable deadline, forcing fallback.
    pub fn unresponsive() -> Self {
        let advisor = Self::new();
        *advisor.delay.lock() = Some(Duration::from_secs(3600));
        advisor
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiAdvisor for MockAiAdvisor {
    async fn generate_task_instructions(&self, _task: &Task, _agent: &Agent) -> Option<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.delay.lock() {
            tokio::time::sleep(delay).await;
        }
        self.instructions.lock().clone()
    }

    async fn suggest_blocker_resolutions(&self, _task: &Task, _description: &str, _severity: Severity) -> Option<Vec<String>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.delay.lock() {
            tokio::time::sleep(delay).await;
        }
        self.suggestions.lock().clone()
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{new_task_draft, test_agent, test_task};

    #[tokio::test]
    async fn forced_error_applies_until_cleared() {
        let provider = MockBoardProvider::new();
        provider.force_error("create_task", ProviderError::Transient("down".into()));
        assert!(provider.create_task(new_task_draft("t1")).await.is_err());
        provider.clear_forced_error("create_task");
        assert!(provider.create_task(new_task_draft("t2")).await.is_ok());
    }

    #[tokio::test]
    async fn call_counts_track_every_invocation() {
        let provider = MockBoardProvider::new();
        provider.create_task(new_task_draft("t1")).await.unwrap();
        provider.create_task(new_task_draft("t2")).await.unwrap();
        assert_eq!(provider.call_count("create_task"), 2);
        assert_eq!(provider.call_count("get_task"), 0);
    }

    #[tokio::test]
    async fn unresponsive_advisor_exceeds_its_own_deadline() {
        let advisor = MockAiAdvisor::unresponsive();
        let result = tokio::time::timeout(
            Duration::from_millis(50),
            advisor.generate_task_instructions(&test_task("t1"), &test_agent("a1")),
        )
        .await;
        assert!(result.is_err());
    }
}
