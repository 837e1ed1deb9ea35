//! Random test data generators using the fake crate
//!
//! Provides realistic random data including:
//! - Task ids with proper formatting
//! - Agent names from a realistic pool
//! - Task names and descriptions
//! - Property-based testing strategies

use chrono::Utc;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use marcus_core::{Priority, Task, TaskStatus};
use proptest::prelude::*;
use rand::Rng;
use std::collections::BTreeSet;

/// Generate a realistic task id (e.g., "PROJ-123", "BUG-456")
pub fn generate_task_id() -> String {
    let prefixes = ["PROJ", "BUG", "FEAT", "DOCS", "TEST", "REFAC"];
    let prefix = prefixes[rand::thread_rng().gen_range(0..prefixes.len())];
    let number: u32 = (1..9999).fake();
    format!("{prefix}-{number:03}")
}

/// Generate a realistic agent name
pub fn generate_agent_name() -> String {
    let agents = [
        "rust-architect",
        "database-engineer",
        "protocol-specialist",
        "integration-lead",
        "testing-expert",
        "documentation-specialist",
        "project-finalizer",
        "security-auditor",
        "performance-optimizer",
    ];
    agents[rand::thread_rng().gen_range(0..agents.len())].to_string()
}

/// Generate a realistic task name
pub fn generate_task_name() -> String {
    Sentence(3..8).fake()
}

/// Generate a realistic task description
pub fn generate_task_description() -> String {
    Paragraph(2..5).fake()
}

/// Generate a random task with realistic data, unassigned and TODO.
pub fn generate_random_task() -> Task {
    let now = Utc::now();
    Task {
        id: generate_task_id(),
        name: generate_task_name(),
        description: generate_task_description(),
        status: generate_random_task_status(),
        priority: generate_random_priority(),
        labels: BTreeSet::new(),
        dependencies: BTreeSet::new(),
        estimated_hours: (1..40).fake::<u32>() as f64,
        actual_hours: 0.0,
        assigned_to: None,
        created_at: now,
        updated_at: now,
        due_date: None,
    }
}

/// Generate a random task status
pub fn generate_random_task_status() -> TaskStatus {
    let statuses = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Blocked, TaskStatus::Done];
    statuses[rand::thread_rng().gen_range(0..statuses.len())]
}

/// Generate a random priority
pub fn generate_random_priority() -> Priority {
    let priorities = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];
    priorities[rand::thread_rng().gen_range(0..priorities.len())]
}

/// Configurable task generator
pub struct TaskGenerator {
    pub id_prefix: String,
    pub label_pool: Vec<String>,
}

impl Default for TaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGenerator {
    /// Create new generator with default settings
    pub fn new() -> Self {
        Self {
            id_prefix: "TEST".to_string(),
            label_pool: vec!["rust".to_string(), "python".to_string(), "docs".to_string()],
        }
    }

    /// Generate task with this generator's settings
    pub fn generate(&self) -> Task {
        let number: u32 = (1..9999).fake();
        let label = &self.label_pool[rand::thread_rng().gen_range(0..self.label_pool.len())];
        let now = Utc::now();

        Task {
            id: format!("{}-{number:03}", self.id_prefix),
            name: generate_task_name(),
            description: generate_task_description(),
            status: generate_random_task_status(),
            priority: generate_random_priority(),
            labels: [label.clone()].into_iter().collect(),
            dependencies: BTreeSet::new(),
            estimated_hours: (1..40).fake::<u32>() as f64,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            due_date: None,
        }
    }
}

/// Proptest strategy for generating valid task ids
pub fn task_id_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{3,8}-[0-9]{1,4}"
}

/// Proptest strategy for generating valid task statuses
pub fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Blocked),
        Just(TaskStatus::Done),
    ]
}

/// Proptest strategy for generating priorities
pub fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::Low), Just(Priority::Medium), Just(Priority::High), Just(Priority::Urgent)]
}

/// Proptest strategy for generating complete, unassigned TODO-eligible tasks.
/// Used by the at-most-one-assignment and DAG-preservation property tests.
pub fn task_strategy() -> impl Strategy<Value = Task> {
    (
        task_id_strategy(),
        "[A-Za-z ]{5,50}",
        "[A-Za-z0-9 .,!?]{10,200}",
        task_status_strategy(),
        priority_strategy(),
    )
        .prop_map(|(id, name, description, status, priority)| {
            let now = Utc::now();
            Task {
                id,
                name,
                description,
                status,
                priority,
                labels: BTreeSet::new(),
                dependencies: BTreeSet::new(),
                estimated_hours: 1.0,
                actual_hours: 0.0,
                assigned_to: None,
                created_at: now,
                updated_at: now,
                due_date: None,
            }
        })
}
