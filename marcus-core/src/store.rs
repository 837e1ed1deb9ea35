//! The Task Store: the single authoritative in-memory view of tasks, agents,
//! assignments and blockers.
//!
//! A single [`parking_lot::Mutex`] guards every map. No `.await` point may
//! occur while the guard is held — callers gather inputs, enter, mutate,
//! exit, then perform I/O.

use crate::error::{MarcusError, Result};
use crate::models::{Agent, Assignment, Blocker, ProjectView, Task, TaskStatus};
use crate::validation::Validator;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Default)]
struct Tables {
    tasks: HashMap<String, Task>,
    agents: HashMap<String, Agent>,
    assignments: HashMap<String, Assignment>,
    blockers: HashMap<String, Blocker>,
    by_status: HashMap<TaskStatus, BTreeSet<String>>,
    by_label: HashMap<String, BTreeSet<String>>,
    /// who depends on this task, i.e. the reverse of `Task::dependencies`.
    deps_reverse: HashMap<String, BTreeSet<String>>,
}

impl Tables {
    fn index_task(&mut self, task: &Task) {
        self.by_status.entry(task.status).or_default().insert(task.id.clone());
        for label in &task.labels {
            self.by_label.entry(label.clone()).or_default().insert(task.id.clone());
        }
        for dep in &task.dependencies {
            self.deps_reverse.entry(dep.clone()).or_default().insert(task.id.clone());
        }
    }

    fn deindex_task(&mut self, task: &Task) {
        if let Some(set) = self.by_status.get_mut(&task.status) {
            set.remove(&task.id);
        }
        for label in &task.labels {
            if let Some(set) = self.by_label.get_mut(label) {
                set.remove(&task.id);
            }
        }
        for dep in &task.dependencies {
            if let Some(set) = self.deps_reverse.get_mut(dep) {
                set.remove(&task.id);
            }
        }
    }
}

/// Outcome of an assignment attempt, distinguishing a lost race from no
/// eligible task existing at all.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignOutcome {
    Assigned(Assignment),
    AlreadyAssigned,
    Unavailable,
}

pub struct TaskStore {
    tables: Mutex<Tables>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Insert or replace a task. Enforces the DAG invariant: a dependency
    /// edge that would create a cycle is rejected before any mutation.
    pub fn upsert_task(&self, task: Task) -> Result<()> {
        let mut tables = self.tables.lock();

        let would_cycle = Validator::would_introduce_cycle(&task.id, &task.dependencies, |id| {
            tables.tasks.get(id).map(|t| t.dependencies.clone())
        });
        if would_cycle {
            return Err(MarcusError::validation(format!(
                "dependencies of task {} would introduce a cycle",
                task.id
            )));
        }

        if let Some(existing) = tables.tasks.get(&task.id).cloned() {
            tables.deindex_task(&existing);
        }
        tables.index_task(&task);
        tables.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn upsert_agent(&self, agent: Agent) -> Result<()> {
        Validator::validate_agent(&agent)?;
        let mut tables = self.tables.lock();
        if let Some(existing) = tables.agents.get(&agent.id) {
            // Double register_agent: update fields, keep existing assignments.
            let mut merged = agent;
            merged.current_tasks = existing.current_tasks.clone();
            merged.completed_count = existing.completed_count;
            tables.agents.insert(merged.id.clone(), merged);
        } else {
            tables.agents.insert(agent.id.clone(), agent);
        }
        Ok(())
    }

    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.tables.lock().tasks.get(task_id).cloned()
    }

    pub fn get_agent(&self, agent_id: &str) -> Option<Agent> {
        self.tables.lock().agents.get(agent_id).cloned()
    }

    pub fn touch_agent_heartbeat(&self, agent_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock();
        let agent = tables
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| MarcusError::not_found("agent", agent_id))?;
        agent.last_heartbeat = at;
        Ok(())
    }

    /// Snapshot of every task whose dependencies are all `Done` and which is
    /// unassigned TODO work — the assignment engine's candidate set.
    pub fn candidate_tasks(&self) -> Vec<Task> {
        let tables = self.tables.lock();
        tables
            .tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::Todo
                    && t.assigned_to.is_none()
                    && t.dependencies.iter().all(|d| {
                        tables
                            .tasks
                            .get(d)
                            .map(|dep| dep.status == TaskStatus::Done)
                            .unwrap_or(false)
                    })
            })
            .cloned()
            .collect()
    }

    pub fn reverse_dependents_count(&self, task_id: &str) -> usize {
        self.tables
            .lock()
            .deps_reverse
            .get(task_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// The sole atomic assigning write in the system: the at-most-once
    /// assignment guarantee rests entirely on this one call being atomic
    /// under the mutex.
    pub fn assign(&self, task_id: &str, agent_id: &str, instructions: String, now: DateTime<Utc>) -> Result<AssignOutcome> {
        let mut tables = self.tables.lock();

        let agent = match tables.agents.get(agent_id) {
            Some(a) => a.clone(),
            None => return Err(MarcusError::not_found("agent", agent_id)),
        };
        if agent.at_capacity() {
            return Ok(AssignOutcome::Unavailable);
        }

        let task = match tables.tasks.get(task_id) {
            Some(t) => t.clone(),
            None => return Err(MarcusError::not_found("task", task_id)),
        };
        if task.status != TaskStatus::Todo || task.assigned_to.is_some() {
            return Ok(AssignOutcome::AlreadyAssigned);
        }
        let deps_done = task.dependencies.iter().all(|d| {
            tables
                .tasks
                .get(d)
                .map(|dep| dep.status == TaskStatus::Done)
                .unwrap_or(false)
        });
        if !deps_done {
            return Ok(AssignOutcome::Unavailable);
        }

        let mut updated = task.clone();
        tables.deindex_task(&updated);
        updated.status = TaskStatus::InProgress;
        updated.assigned_to = Some(agent_id.to_string());
        updated.updated_at = now;
        tables.index_task(&updated);
        tables.tasks.insert(task_id.to_string(), updated);

        let mut agent_mut = agent;
        agent_mut.current_tasks.insert(task_id.to_string());
        tables.agents.insert(agent_id.to_string(), agent_mut);

        let assignment = Assignment {
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            assigned_at: now,
            instructions,
            deadline: None,
        };
        tables.assignments.insert(task_id.to_string(), assignment.clone());

        Ok(AssignOutcome::Assigned(assignment))
    }

    /// Validate and apply a lifecycle transition. Does not talk to the Board
    /// Provider; that mirroring happens in the Lifecycle State Machine after
    /// this call returns, outside the lock.
    pub fn set_status(&self, task_id: &str, new_status: TaskStatus, now: DateTime<Utc>) -> Result<Task> {
        let mut tables = self.tables.lock();
        let task = tables
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| MarcusError::not_found("task", task_id))?;

        if !task.can_transition_to(new_status) {
            return Err(MarcusError::invalid_transition(task.status, new_status));
        }

        let mut updated = task.clone();
        tables.deindex_task(&updated);
        updated.status = new_status;
        updated.updated_at = now;
        tables.index_task(&updated);
        tables.tasks.insert(task_id.to_string(), updated.clone());
        Ok(updated)
    }

    /// Sets a task's status directly, bypassing the lifecycle transition
    /// table. Used only by reconciliation: the external board is
    /// authoritative for status there, and board drift can legitimately skip
    /// states the internal machine never transitions through directly (e.g.
    /// a card moved straight from a blocked column to Done). Ordinary
    /// agent-driven transitions must go through [`Self::set_status`].
    pub fn force_status(&self, task_id: &str, new_status: TaskStatus, now: DateTime<Utc>) -> Result<Task> {
        let mut tables = self.tables.lock();
        let task = tables
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| MarcusError::not_found("task", task_id))?;

        let mut updated = task.clone();
        tables.deindex_task(&updated);
        updated.status = new_status;
        updated.updated_at = now;
        tables.index_task(&updated);
        tables.tasks.insert(task_id.to_string(), updated.clone());
        Ok(updated)
    }

    /// Clears an assignment: on completion, cancellation, or reassignment.
    pub fn clear_assignment(&self, task_id: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        tables.assignments.remove(task_id);
        let agent_id = tables.tasks.get(task_id).and_then(|t| t.assigned_to.clone());

        if let Some(task) = tables.tasks.get_mut(task_id) {
            task.assigned_to = None;
        } else {
            return Err(MarcusError::not_found("task", task_id));
        }
        if let Some(agent_id) = agent_id {
            if let Some(agent) = tables.agents.get_mut(&agent_id) {
                agent.current_tasks.remove(task_id);
            }
        }
        Ok(())
    }

    /// Updates `actual_hours` on a progress report that carries a time log.
    pub fn set_actual_hours(&self, task_id: &str, hours: f64) -> Result<()> {
        let mut tables = self.tables.lock();
        let task = tables
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| MarcusError::not_found("task", task_id))?;
        task.actual_hours = hours;
        Ok(())
    }

    /// Bumps `updated_at` without a status change, e.g. a non-completing
    /// progress report.
    pub fn touch_task_updated(&self, task_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock();
        let task = tables
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| MarcusError::not_found("task", task_id))?;
        task.updated_at = now;
        Ok(())
    }

    pub fn increment_completed_count(&self, agent_id: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        let agent = tables
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| MarcusError::not_found("agent", agent_id))?;
        agent.completed_count += 1;
        Ok(())
    }

    pub fn record_blocker(&self, blocker: Blocker) {
        self.tables.lock().blockers.insert(blocker.id.clone(), blocker);
    }

    pub fn resolve_blocker(&self, task_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock();
        let blocker_id = tables
            .blockers
            .values()
            .find(|b| b.task_id == task_id && b.resolved_at.is_none())
            .map(|b| b.id.clone());
        if let Some(id) = blocker_id {
            if let Some(blocker) = tables.blockers.get_mut(&id) {
                blocker.resolved_at = Some(now);
            }
        }
        Ok(())
    }

    /// Stale agents: those whose heartbeat is older than `ttl` and who still
    /// hold at least one task. Returns `(agent_id, task_ids)` pairs; the
    /// caller applies the actual clearing outside any lock-holding loop.
    pub fn stale_agents(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> Vec<(String, Vec<String>)> {
        let tables = self.tables.lock();
        tables
            .agents
            .values()
            .filter(|a| a.is_stale(now, ttl) && !a.current_tasks.is_empty())
            .map(|a| (a.id.clone(), a.current_tasks.iter().cloned().collect()))
            .collect()
    }

    pub fn snapshot(&self) -> ProjectView {
        let tables = self.tables.lock();
        let mut counts_by_status: BTreeMap<String, usize> = BTreeMap::new();
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Blocked, TaskStatus::Done] {
            counts_by_status.insert(status.to_string(), tables.by_status.get(&status).map(|s| s.len()).unwrap_or(0));
        }
        let total = tables.tasks.len();
        let done = counts_by_status.get("done").copied().unwrap_or(0);
        let completion_percentage = if total == 0 { 0.0 } else { (done as f64 / total as f64) * 100.0 };

        let blocked_tasks: Vec<String> = tables
            .by_status
            .get(&TaskStatus::Blocked)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();

        let mut workload_by_agent = BTreeMap::new();
        for agent in tables.agents.values() {
            workload_by_agent.insert(agent.id.clone(), agent.current_tasks.len());
        }

        ProjectView {
            counts_by_status,
            completion_percentage,
            stale_tasks: Vec::new(),
            blocked_tasks,
            workload_by_agent,
        }
    }

    pub fn all_tasks(&self) -> Vec<Task> {
        self.tables.lock().tasks.values().cloned().collect()
    }

    pub fn all_agents(&self) -> Vec<Agent> {
        self.tables.lock().agents.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn task(id: &str, status: TaskStatus, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            status,
            priority: Priority::Medium,
            labels: BTreeSet::new(),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            estimated_hours: 0.0,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            due_date: None,
        }
    }

    fn agent(id: &str, capacity: u32) -> Agent {
        let mut a = Agent::new(id, id, "coder", vec![]);
        a.capacity = capacity;
        a
    }

    #[test]
    fn upsert_rejects_cycle() {
        let store = TaskStore::new();
        store.upsert_task(task("t1", TaskStatus::Todo, &[])).unwrap();
        store.upsert_task(task("t2", TaskStatus::Todo, &["t1"])).unwrap();
        // t1 now depends on t2, which depends on t1: cycle.
        let err = store.upsert_task(task("t1", TaskStatus::Todo, &["t2"])).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn assign_is_atomic_and_exclusive() {
        let store = TaskStore::new();
        store.upsert_agent(agent("a1", 1)).unwrap();
        store.upsert_task(task("t1", TaskStatus::Todo, &[])).unwrap();

        let outcome = store.assign("t1", "a1", "do it".into(), Utc::now()).unwrap();
        assert!(matches!(outcome, AssignOutcome::Assigned(_)));

        let outcome2 = store.assign("t1", "a1", "do it".into(), Utc::now()).unwrap();
        assert_eq!(outcome2, AssignOutcome::AlreadyAssigned);
    }

    #[test]
    fn assign_respects_capacity() {
        let store = TaskStore::new();
        store.upsert_agent(agent("a1", 1)).unwrap();
        store.upsert_task(task("t1", TaskStatus::Todo, &[])).unwrap();
        store.upsert_task(task("t2", TaskStatus::Todo, &[])).unwrap();

        store.assign("t1", "a1", "x".into(), Utc::now()).unwrap();
        let outcome = store.assign("t2", "a1", "x".into(), Utc::now()).unwrap();
        assert_eq!(outcome, AssignOutcome::Unavailable);
    }

    #[test]
    fn assign_requires_dependencies_done() {
        let store = TaskStore::new();
        store.upsert_agent(agent("a1", 1)).unwrap();
        store.upsert_task(task("t1", TaskStatus::Todo, &[])).unwrap();
        store.upsert_task(task("t2", TaskStatus::Todo, &["t1"])).unwrap();

        let outcome = store.assign("t2", "a1", "x".into(), Utc::now()).unwrap();
        assert_eq!(outcome, AssignOutcome::Unavailable);
    }

    #[test]
    fn double_register_keeps_existing_assignments() {
        let store = TaskStore::new();
        store.upsert_agent(agent("a1", 2)).unwrap();
        store.upsert_task(task("t1", TaskStatus::Todo, &[])).unwrap();
        store.assign("t1", "a1", "x".into(), Utc::now()).unwrap();

        store.upsert_agent(agent("a1", 3)).unwrap();
        let a = store.get_agent("a1").unwrap();
        assert_eq!(a.capacity, 3);
        assert!(a.current_tasks.contains("t1"));
    }

    #[test]
    fn set_status_validates_transition() {
        let store = TaskStore::new();
        store.upsert_task(task("t1", TaskStatus::Todo, &[])).unwrap();
        let err = store.set_status("t1", TaskStatus::Done, Utc::now()).unwrap_err();
        assert!(matches!(err, MarcusError::InvalidTransition(_, _)));
    }

    #[test]
    fn stale_agents_detected_by_ttl() {
        let store = TaskStore::new();
        let mut a = agent("a1", 1);
        a.last_heartbeat = Utc::now() - chrono::Duration::seconds(600);
        store.upsert_agent(a).unwrap();
        store.upsert_task(task("t1", TaskStatus::Todo, &[])).unwrap();
        store.assign("t1", "a1", "x".into(), Utc::now()).unwrap();

        let stale = store.stale_agents(Utc::now(), chrono::Duration::seconds(300));
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].0, "a1");
    }

    /// Walks every task's `dependencies` edges looking for a cycle; used only
    /// to check the property below from outside `upsert_task` itself.
    fn has_cycle(tasks: &HashMap<String, Task>) -> bool {
        fn visit(id: &str, tasks: &HashMap<String, Task>, visiting: &mut BTreeSet<String>, done: &mut BTreeSet<String>) -> bool {
            if done.contains(id) {
                return false;
            }
            if !visiting.insert(id.to_string()) {
                return true;
            }
            if let Some(t) = tasks.get(id) {
                for dep in &t.dependencies {
                    if visit(dep, tasks, visiting, done) {
                        return true;
                    }
                }
            }
            visiting.remove(id);
            done.insert(id.to_string());
            false
        }

        let mut done = BTreeSet::new();
        for id in tasks.keys() {
            let mut visiting = BTreeSet::new();
            if visit(id, tasks, &mut visiting, &mut done) {
                return true;
            }
        }
        false
    }

    proptest! {
        /// Property 3 (spec §8): after any sequence of `upsert_task` calls —
        /// whether each is accepted or rejected — the store never ends up
        /// holding a cyclic dependency graph.
        #[test]
        fn dag_preserved_under_random_upserts(
            ops in prop::collection::vec((0usize..6, prop::collection::vec(0usize..6, 0..3)), 1..20)
        ) {
            let store = TaskStore::new();
            for (id_idx, dep_idxs) in ops {
                let id = format!("t{id_idx}");
                let deps: BTreeSet<String> = dep_idxs.iter().map(|i| format!("t{i}")).collect();
                let mut t = task(&id, TaskStatus::Todo, &[]);
                t.dependencies = deps;
                let _ = store.upsert_task(t);
            }
            let tables = store.tables.lock();
            prop_assert!(!has_cycle(&tables.tasks));
        }

        /// Property 2 (spec §8): an agent's `current_tasks` never exceeds its
        /// `capacity`, across any sequence of `assign` attempts against a
        /// fixed pool of independent TODO tasks.
        #[test]
        fn capacity_never_exceeded_under_random_assignments(
            capacity in 1u32..5,
            task_count in 1usize..10,
            attempts in 1usize..15,
        ) {
            let store = TaskStore::new();
            store.upsert_agent(agent("a1", capacity)).unwrap();
            for i in 0..task_count {
                store.upsert_task(task(&format!("t{i}"), TaskStatus::Todo, &[])).unwrap();
            }
            for i in 0..attempts {
                let task_id = format!("t{}", i % task_count.max(1));
                let _ = store.assign(&task_id, "a1", "x".into(), Utc::now());
            }
            let a = store.get_agent("a1").unwrap();
            prop_assert!(a.current_tasks.len() <= a.capacity as usize);
        }
    }
}
