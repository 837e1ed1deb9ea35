//! Custom assertion helpers for testing
//!
//! Provides specialized assertions for:
//! - Task equality with clear error messages
//! - State transition validation
//! - Collection-based assertions

use marcus_core::{Task, TaskStatus};

/// Assert tasks are equal ignoring timestamps
pub fn assert_task_equals(actual: &Task, expected: &Task) {
    assert_eq!(actual.id, expected.id, "Task IDs don't match");
    assert_eq!(actual.name, expected.name, "Task names don't match");
    assert_eq!(actual.description, expected.description, "Task descriptions don't match");
    assert_eq!(actual.assigned_to, expected.assigned_to, "Task assignees don't match");
    assert_eq!(actual.status, expected.status, "Task statuses don't match");
    // Note: timestamps are ignored in this assertion
}

/// Assert tasks are equal including exact timestamps
pub fn assert_task_equals_exact(actual: &Task, expected: &Task) {
    assert_eq!(actual, expected, "Tasks are not exactly equal");
}

/// Assert task matches partial criteria
pub fn assert_task_matches(task: &Task, matcher: &TaskMatcher) {
    if let Some(ref expected_id) = matcher.id {
        assert_eq!(task.id, *expected_id, "Task ID doesn't match expected");
    }
    if let Some(ref expected_name) = matcher.name {
        assert_eq!(task.name, *expected_name, "Task name doesn't match expected");
    }
    if let Some(ref expected_owner) = matcher.assigned_to {
        assert_eq!(task.assigned_to.as_ref(), Some(expected_owner), "Task owner doesn't match expected");
    }
    if let Some(expected_status) = matcher.status {
        assert_eq!(task.status, expected_status, "Task status doesn't match expected");
    }
}

/// Assert state transition is valid according to the lifecycle transition table
pub fn assert_state_transition_valid(from: TaskStatus, to: TaskStatus) {
    let dummy_task = dummy_task_in(from);
    assert!(
        dummy_task.can_transition_to(to),
        "Expected transition from {from:?} to {to:?} to be valid, but it's not"
    );
}

/// Assert state transition is invalid according to the lifecycle transition table
pub fn assert_state_transition_invalid(from: TaskStatus, to: TaskStatus) {
    let dummy_task = dummy_task_in(from);
    assert!(
        !dummy_task.can_transition_to(to),
        "Expected transition from {from:?} to {to:?} to be invalid, but it's valid"
    );
}

fn dummy_task_in(status: TaskStatus) -> Task {
    Task {
        id: "TEST-001".to_string(),
        name: "Test".to_string(),
        description: "Test".to_string(),
        status,
        priority: marcus_core::Priority::Medium,
        labels: Default::default(),
        dependencies: Default::default(),
        estimated_hours: 0.0,
        actual_hours: 0.0,
        assigned_to: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        due_date: None,
    }
}

/// Assert task list contains a task with a specific id
pub fn assert_contains_task_with_id(tasks: &[Task], id: &str) {
    assert!(
        tasks.iter().any(|t| t.id == id),
        "Expected to find task with id '{}' in task list, but it wasn't found. Available ids: {:?}",
        id,
        tasks.iter().map(|t| &t.id).collect::<Vec<_>>()
    );
}

/// Assert tasks are sorted by creation date (most recent first)
pub fn assert_tasks_sorted_by_date(tasks: &[Task]) {
    for window in tasks.windows(2) {
        assert!(
            window[0].created_at >= window[1].created_at,
            "Tasks are not sorted by creation date (most recent first). Task '{}' ({}) comes before '{}' ({})",
            window[0].id,
            window[0].created_at,
            window[1].id,
            window[1].created_at
        );
    }
}

/// Flexible task matcher for partial assertions
#[derive(Debug, Default)]
pub struct TaskMatcher {
    pub id: Option<String>,
    pub name: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskMatcher {
    /// Create a new empty matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Match tasks with specific id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Match tasks with specific name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Match tasks with specific assignee
    pub fn with_assigned_to(mut self, agent_id: impl Into<String>) -> Self {
        self.assigned_to = Some(agent_id.into());
        self
    }

    /// Match tasks with specific status
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test_task_with_status;

    #[test]
    fn transition_assertions_match_lifecycle_table() {
        assert_state_transition_valid(TaskStatus::Todo, TaskStatus::InProgress);
        assert_state_transition_invalid(TaskStatus::Todo, TaskStatus::Done);
    }

    #[test]
    fn matcher_checks_status() {
        let task = test_task_with_status("t1", TaskStatus::Blocked);
        assert_task_matches(&task, &TaskMatcher::new().with_status(TaskStatus::Blocked));
    }

    #[test]
    fn contains_task_with_id_finds_member() {
        let tasks = vec![test_task_with_status("t1", TaskStatus::Todo)];
        assert_contains_task_with_id(&tasks, "t1");
    }
}
