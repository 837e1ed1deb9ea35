//! Ready-made domain values for tests that don't care about builder
//! ergonomics and just want a plausible [`Task`]/[`Agent`].

use crate::builders::TaskBuilder;
use chrono::Utc;
use marcus_core::{Agent, Priority, Task, TaskDraft, TaskStatus};

pub fn test_task(id: &str) -> Task {
    TaskBuilder::new(id).name(format!("Task {id}")).build()
}

pub fn test_task_with_status(id: &str, status: TaskStatus) -> Task {
    TaskBuilder::new(id).name(format!("Task {id}")).status(status).build()
}

pub fn test_task_with_owner(id: &str, agent_id: &str) -> Task {
    TaskBuilder::new(id)
        .name(format!("Task {id}"))
        .status(TaskStatus::InProgress)
        .assigned_to(agent_id)
        .build()
}

/// `count` independent TODO tasks, ids `t1..tN`, no shared labels or deps.
pub fn test_tasks(count: usize) -> Vec<Task> {
    (1..=count).map(|n| test_task(&format!("t{n}"))).collect()
}

/// One task in each of the four [`TaskStatus`] values, ids prefixed by status.
pub fn tasks_in_all_states() -> Vec<Task> {
    [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Blocked, TaskStatus::Done]
        .into_iter()
        .map(|status| test_task_with_status(&format!("{status}-task"), status))
        .collect()
}

pub fn test_agent(id: &str) -> Agent {
    Agent::new(id, format!("Agent {id}"), "coder", vec!["rust".to_string()])
}

pub fn test_agent_with_capacity(id: &str, capacity: u32) -> Agent {
    let mut agent = test_agent(id);
    agent.capacity = capacity;
    agent
}

pub fn stale_agent(id: &str, stale_for: chrono::Duration) -> Agent {
    let mut agent = test_agent(id);
    agent.last_heartbeat = Utc::now() - stale_for;
    agent
}

pub fn new_task_draft(name: &str) -> TaskDraft {
    TaskDraft {
        name: name.to_string(),
        description: format!("Description for {name}"),
        priority: Priority::Medium,
        estimated_hours: 1.0,
        ..Default::default()
    }
}

/// The convenience alias `draft` is kept short for doubles/tests that create
/// many drafts inline.
pub fn draft(name: &str) -> TaskDraft {
    new_task_draft(name)
}
