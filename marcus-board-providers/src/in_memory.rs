//! An in-memory [`BoardProvider`] stand-in.
//!
//! Used as the default provider for local development and as the backbone
//! of test fixtures: it implements the full contract faithfully (including
//! idempotent status moves and comment history) without talking to a real
//! kanban vendor.

use async_trait::async_trait;
use chrono::Utc;
use marcus_core::{
    BoardProvider, BoardSummary, ProviderError, ProviderResult, Task, TaskDraft, TaskStatus,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct State {
    tasks: HashMap<String, Task>,
    comments: HashMap<String, Vec<String>>,
    assignees: HashMap<String, Option<String>>,
}

/// Thread-safe in-memory board. Call history is tracked for test assertions
/// the way `marcus-mocks`'s repository doubles track theirs.
pub struct InMemoryBoardProvider {
    state: Mutex<State>,
    next_id: AtomicU64,
    call_history: Mutex<Vec<String>>,
    error_injection: Mutex<Option<ProviderError>>,
}

impl Default for InMemoryBoardProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBoardProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1),
            call_history: Mutex::new(Vec::new()),
            error_injection: Mutex::new(None),
        }
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let provider = Self::new();
        let mut state = provider.state.lock();
        for task in tasks {
            state.tasks.insert(task.id.clone(), task);
        }
        drop(state);
        provider
    }

    /// Arranges for the next call to fail with `error`, consuming the
    /// injection so subsequent calls succeed normally.
    pub fn inject_error(&self, error: ProviderError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn comments_for(&self, task_id: &str) -> Vec<String> {
        self.state.lock().comments.get(task_id).cloned().unwrap_or_default()
    }

    /// Directly mutate a task's status, bypassing the provider contract —
    /// used by tests simulating drift introduced through the board UI.
    pub fn set_external_status(&self, task_id: &str, status: TaskStatus) {
        if let Some(task) = self.state.lock().tasks.get_mut(task_id) {
            task.status = status;
        }
    }

    fn record(&self, call: &str) {
        self.call_history.lock().push(call.to_string());
    }

    fn take_injected_error(&self) -> Option<ProviderError> {
        self.error_injection.lock().take()
    }
}

#[async_trait]
impl BoardProvider for InMemoryBoardProvider {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn list_available_tasks(&self) -> ProviderResult<Vec<Task>> {
        self.record("list_available_tasks");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        Ok(self.state.lock().tasks.values().cloned().collect())
    }

    async fn get_task(&self, task_id: &str) -> ProviderResult<Task> {
        self.record("get_task");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        self.state
            .lock()
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(task_id.to_string()))
    }

    async fn create_task(&self, draft: TaskDraft) -> ProviderResult<Task> {
        self.record("create_task");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let task = Task {
            id: format!("t{id}"),
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
        self.state.lock().tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update_status(&self, task_id: &str, status: TaskStatus) -> ProviderResult<()> {
        self.record("update_status");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let mut state = self.state.lock();
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| ProviderError::NotFound(task_id.to_string()))?;
        task.status = status;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn add_comment(&self, task_id: &str, text: &str) -> ProviderResult<()> {
        self.record("add_comment");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let mut state = self.state.lock();
        if !state.tasks.contains_key(task_id) {
            return Err(ProviderError::NotFound(task_id.to_string()));
        }
        state.comments.entry(task_id.to_string()).or_default().push(text.to_string());
        Ok(())
    }

    async fn set_assignee(&self, task_id: &str, agent_id: Option<&str>) -> ProviderResult<()> {
        self.record("set_assignee");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let mut state = self.state.lock();
        if !state.tasks.contains_key(task_id) {
            return Err(ProviderError::NotFound(task_id.to_string()));
        }
        state.assignees.insert(task_id.to_string(), agent_id.map(String::from));
        Ok(())
    }

    async fn get_board_summary(&self) -> ProviderResult<BoardSummary> {
        self.record("get_board_summary");
        if let Some(e) = self.take_injected_error() {
            return Err(e);
        }
        let state = self.state.lock();
        let mut counts_by_status = std::collections::BTreeMap::new();
        for task in state.tasks.values() {
            *counts_by_status.entry(task.status.to_string()).or_insert(0) += 1;
        }
        Ok(BoardSummary {
            total_tasks: state.tasks.len(),
            counts_by_status,
        })
    }
}
