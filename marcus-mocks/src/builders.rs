//! Fluent builders for Marcus's domain types, for tests that need to tweak
//! one or two fields off a sane default rather than spelling out every
//! field of a [`Task`]/[`Agent`] literal.

use chrono::{DateTime, Utc};
use marcus_core::{Agent, Blocker, Priority, Severity, Task, TaskDraft, TaskStatus};
use std::collections::BTreeSet;

pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            task: Task {
                id: id.clone(),
                name: id,
                description: String::new(),
                status: TaskStatus::Todo,
                priority: Priority::Medium,
                labels: BTreeSet::new(),
                dependencies: BTreeSet::new(),
                estimated_hours: 1.0,
                actual_hours: 0.0,
                assigned_to: None,
                created_at: now,
                updated_at: now,
                due_date: None,
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.task.name = name.into();
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn assigned_to(mut self, agent_id: impl Into<String>) -> Self {
        self.task.assigned_to = Some(agent_id.into());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.task.created_at = at;
        self
    }

    pub fn due_date(mut self, at: DateTime<Utc>) -> Self {
        self.task.due_date = Some(at);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

pub struct AgentBuilder {
    agent: Agent,
}

impl AgentBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            agent: Agent::new(id.clone(), id, "coder", Vec::new()),
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.agent.role = role.into();
        self
    }

    pub fn skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agent.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.agent.capacity = capacity;
        self
    }

    pub fn last_heartbeat(mut self, at: DateTime<Utc>) -> Self {
        self.agent.last_heartbeat = at;
        self
    }

    pub fn build(self) -> Agent {
        self.agent
    }
}

pub struct TaskDraftBuilder {
    draft: TaskDraft,
}

impl TaskDraftBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            draft: TaskDraft {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.draft.description = description.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.draft.priority = priority;
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> TaskDraft {
        self.draft
    }
}

pub struct BlockerBuilder {
    blocker: Blocker,
}

impl BlockerBuilder {
    pub fn new(id: impl Into<String>, task_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            blocker: Blocker {
                id: id.into(),
                task_id: task_id.into(),
                agent_id: agent_id.into(),
                description: String::new(),
                severity: Severity::Medium,
                opened_at: Utc::now(),
                resolved_at: None,
                suggestions: Vec::new(),
            },
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.blocker.description = description.into();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.blocker.severity = severity;
        self
    }

    pub fn suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocker.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    pub fn resolved(mut self, at: DateTime<Utc>) -> Self {
        self.blocker.resolved_at = Some(at);
        self
    }

    pub fn build(self) -> Blocker {
        self.blocker
    }
}
