//! Domain entities: Task, Agent, Assignment, Blocker and the derived ProjectView.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle status of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Blocked,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Priority as carried on the board and used by the assignment scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Weight used by the assignment engine's `priority_score` term.
    pub fn score(self) -> f64 {
        match self {
            Priority::Urgent => 4.0,
            Priority::High => 3.0,
            Priority::Medium => 2.0,
            Priority::Low => 1.0,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// A unit of work tracked by the assignment & lifecycle engine.
///
/// `id` is assigned by the Board Provider; Marcus never invents task ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub labels: BTreeSet<String>,
    pub dependencies: BTreeSet<String>,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    /// A task is available for assignment iff it is unassigned TODO work whose
    /// dependencies are all done.
    pub fn is_available(&self, done: impl Fn(&str) -> bool) -> bool {
        self.status == TaskStatus::Todo
            && self.assigned_to.is_none()
            && self.dependencies.iter().all(|d| done(d))
    }

    /// Returns true if `to` is a legal next state in the lifecycle transition table.
    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self.status, to),
            (Todo, InProgress)
                | (InProgress, Blocked)
                | (Blocked, InProgress)
                | (InProgress, Done)
                | (InProgress, Todo)
                | (Blocked, Todo)
        )
    }
}

/// Payload used to create a task through a Board Provider.
///
/// Dependencies are carried by *external* id, since a batch of drafts may
/// reference each other before any of them has a provider-assigned id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    pub name: String,
    pub description: String,
    pub labels: BTreeSet<String>,
    pub priority: Priority,
    pub estimated_hours: f64,
    pub dependencies: Vec<String>,
}

/// An autonomous worker known to Marcus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub role: String,
    pub skills: Vec<String>,
    pub capacity: u32,
    pub current_tasks: BTreeSet<String>,
    pub completed_count: u64,
    pub last_heartbeat: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>, skills: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            skills,
            capacity: 1,
            current_tasks: BTreeSet::new(),
            completed_count: 0,
            last_heartbeat: Utc::now(),
        }
    }

    pub fn at_capacity(&self) -> bool {
        self.current_tasks.len() as u32 >= self.capacity
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_heartbeat > ttl
    }
}

/// The binding of a task to an agent, held while the task is in-progress or blocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: String,
    pub agent_id: String,
    pub assigned_at: DateTime<Utc>,
    pub instructions: String,
    pub deadline: Option<DateTime<Utc>>,
}

/// Severity of a [`Blocker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        write!(f, "{s}")
    }
}

/// A reported impediment keeping a task from progressing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub id: String,
    pub task_id: String,
    pub agent_id: String,
    pub description: String,
    pub severity: Severity,
    pub opened_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub suggestions: Vec<String>,
}

/// Aggregate, derived view over the Task Store. Never persisted as ground truth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectView {
    pub counts_by_status: std::collections::BTreeMap<String, usize>,
    pub completion_percentage: f64,
    pub stale_tasks: Vec<String>,
    pub blocked_tasks: Vec<String>,
    pub workload_by_agent: std::collections::BTreeMap<String, usize>,
}
