//! The Assignment Engine: picks the best task for a requesting agent and
//! enforces the at-most-once assignment guarantee.
//!
//! The only atomic assigning write in the system is [`TaskStore::assign`];
//! everything in this module reads candidates, scores them, and retries on
//! lost races, but never claims a task by any other path.

use crate::advisor::{generate_instructions_with_fallback, AiAdvisor};
use crate::board_provider::BoardProvider;
use crate::error::{MarcusError, Result};
use crate::models::{Agent, Assignment, Task, TaskStatus};
use crate::reconciliation::PushRetryQueue;
use crate::store::{AssignOutcome, TaskStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Why `request_next_task` returned no task, surfaced verbatim to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoTaskReason {
    AtCapacity,
    Contention,
    NoTask,
}

impl NoTaskReason {
    pub fn as_str(self) -> &'static str {
        match self {
            NoTaskReason::AtCapacity => "at_capacity",
            NoTaskReason::Contention => "contention",
            NoTaskReason::NoTask => "no_task",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Assigned(Assignment),
    NoTaskAvailable(NoTaskReason),
}

pub struct AssignmentEngine {
    store: Arc<TaskStore>,
    provider: Arc<dyn BoardProvider>,
    advisor: Arc<dyn AiAdvisor>,
    push_retry: Arc<PushRetryQueue>,
    retry_limit: u32,
}

impl AssignmentEngine {
    pub fn new(
        store: Arc<TaskStore>,
        provider: Arc<dyn BoardProvider>,
        advisor: Arc<dyn AiAdvisor>,
        push_retry: Arc<PushRetryQueue>,
        retry_limit: u32,
    ) -> Self {
        Self {
            store,
            provider,
            advisor,
            push_retry,
            retry_limit,
        }
    }

    /// Ranks and assigns the best candidate task to `agent_id`, end to end.
    pub async fn request_next_task(&self, agent_id: &str) -> Result<RequestOutcome> {
        let agent = self
            .store
            .get_agent(agent_id)
            .ok_or_else(|| MarcusError::not_found("agent", agent_id))?;
        if agent.at_capacity() {
            return Ok(RequestOutcome::NoTaskAvailable(NoTaskReason::AtCapacity));
        }

        let mut candidates = self.store.candidate_tasks();
        if candidates.is_empty() {
            return Ok(RequestOutcome::NoTaskAvailable(NoTaskReason::NoTask));
        }
        self.rank(&mut candidates, &agent);

        let mut attempts = 0u32;
        for candidate in candidates {
            if attempts >= self.retry_limit {
                break;
            }
            attempts += 1;

            let instructions = generate_instructions_with_fallback(self.advisor.as_ref(), &candidate, &agent).await;
            let now = Utc::now();
            match self.store.assign(&candidate.id, agent_id, instructions, now)? {
                AssignOutcome::Assigned(assignment) => {
                    self.mirror_assignment(&candidate, &assignment).await;
                    return Ok(RequestOutcome::Assigned(assignment));
                }
                AssignOutcome::AlreadyAssigned => {
                    // Lost the race to another caller; try the next candidate.
                    continue;
                }
                AssignOutcome::Unavailable => {
                    // A dependency completed or the agent hit capacity between
                    // candidate-set computation and this attempt; skip it.
                    continue;
                }
            }
        }

        Ok(RequestOutcome::NoTaskAvailable(NoTaskReason::Contention))
    }

    /// Mirror the freshly recorded internal assignment to the provider.
    /// Mirror failures never roll back the internal assignment; they are
    /// queued for the background push-retry worker.
    async fn mirror_assignment(&self, task: &Task, assignment: &Assignment) {
        if let Err(e) = self.provider.update_status(&task.id, TaskStatus::InProgress).await {
            warn!(task_id = %task.id, error = %e, "provider mirror failed on assignment, queuing push retry");
            self.push_retry.enqueue(task.id.clone(), TaskStatus::InProgress);
        }
        if let Err(e) = self.provider.set_assignee(&task.id, Some(&assignment.agent_id)).await {
            warn!(task_id = %task.id, error = %e, "set_assignee mirror failed");
        }
        let comment = format!("Assigned to {}", assignment.agent_id);
        if let Err(e) = self.provider.add_comment(&task.id, &comment).await {
            warn!(task_id = %task.id, error = %e, "assignment comment mirror failed");
        }
        info!(task_id = %task.id, agent_id = %assignment.agent_id, "task assigned");
    }

    /// Scores and sorts `candidates` in place, highest score first. Ties are
    /// broken by earliest `created_at`, then lexicographic id.
    fn rank(&self, candidates: &mut [Task], agent: &Agent) {
        let now = Utc::now();
        candidates.sort_by(|a, b| {
            let score_a = Self::score(a, agent, &self.store, now);
            let score_b = Self::score(b, agent, &self.store, now);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    fn score(task: &Task, agent: &Agent, store: &TaskStore, now: chrono::DateTime<Utc>) -> f64 {
        let priority = task.priority.score();
        let skill = Self::skill_score(task, agent);
        let age = Self::age_score(task, now);
        let unblock = store.reverse_dependents_count(&task.id).min(5) as f64 / 5.0;
        10.0 * priority + 5.0 * skill + 2.0 * age + 3.0 * unblock
    }

    /// Fraction of `task.labels` intersecting `agent.skills`; neutral 0.5 if
    /// the task carries no skill-indicating labels at all.
    fn skill_score(task: &Task, agent: &Agent) -> f64 {
        if task.labels.is_empty() {
            return 0.5;
        }
        let matches = task.labels.iter().filter(|l| agent.skills.iter().any(|s| s == *l)).count();
        matches as f64 / task.labels.len() as f64
    }

    fn age_score(task: &Task, now: chrono::DateTime<Utc>) -> f64 {
        let age_days = (now - task.created_at).num_seconds() as f64 / 86_400.0;
        (age_days / 14.0).clamp(0.0, 1.0)
    }
}

/// Background sweep that reassigns tasks held by agents whose heartbeat has
/// gone stale — the only non-agent-driven way off IN_PROGRESS besides an
/// explicit unassign.
pub async fn sweep_stale_agents(store: &TaskStore, provider: &dyn BoardProvider, ttl: chrono::Duration) {
    let now = Utc::now();
    for (agent_id, task_ids) in store.stale_agents(now, ttl) {
        for task_id in task_ids {
            if let Err(e) = store.set_status(&task_id, TaskStatus::Todo, now) {
                warn!(task_id, error = %e, "failed to clear stale task status");
                continue;
            }
            if let Err(e) = store.clear_assignment(&task_id) {
                warn!(task_id, error = %e, "failed to clear stale assignment");
                continue;
            }
            let comment = "reassigned due to agent timeout";
            if let Err(e) = provider.update_status(&task_id, TaskStatus::Todo).await {
                warn!(task_id, error = %e, "stale reassignment mirror failed");
            }
            if let Err(e) = provider.add_comment(&task_id, comment).await {
                warn!(task_id, error = %e, "stale reassignment comment failed");
            }
            info!(task_id, agent_id = %agent_id, "task reassigned after agent went stale");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::FallbackAdvisor;
    use crate::board_provider::{BoardSummary, ProviderError, ProviderResult};
    use crate::models::{Priority, TaskDraft};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopProvider {
        calls: AtomicUsize,
    }

    impl NoopProvider {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl BoardProvider for NoopProvider {
        fn name(&self) -> &str {
            "noop"
        }
        async fn list_available_tasks(&self) -> ProviderResult<Vec<Task>> {
            Ok(vec![])
        }
        async fn get_task(&self, task_id: &str) -> ProviderResult<Task> {
            Err(ProviderError::NotFound(task_id.to_string()))
        }
        async fn create_task(&self, _draft: TaskDraft) -> ProviderResult<Task> {
            unimplemented!()
        }
        async fn update_status(&self, _task_id: &str, _status: TaskStatus) -> ProviderResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn add_comment(&self, _task_id: &str, _text: &str) -> ProviderResult<()> {
            Ok(())
        }
        async fn set_assignee(&self, _task_id: &str, _agent_id: Option<&str>) -> ProviderResult<()> {
            Ok(())
        }
        async fn get_board_summary(&self) -> ProviderResult<BoardSummary> {
            Ok(BoardSummary::default())
        }
    }

    fn task(id: &str, priority: Priority, labels: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority,
            labels: labels.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            dependencies: BTreeSet::new(),
            estimated_hours: 0.0,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            due_date: None,
        }
    }

    fn agent(id: &str, skills: Vec<&str>) -> Agent {
        Agent::new(id, id, "coder", skills.into_iter().map(String::from).collect())
    }

    fn engine(store: Arc<TaskStore>) -> AssignmentEngine {
        AssignmentEngine::new(
            store,
            Arc::new(NoopProvider::new()),
            Arc::new(FallbackAdvisor),
            Arc::new(PushRetryQueue::new(5)),
            3,
        )
    }

    #[tokio::test]
    async fn picks_highest_priority_task() {
        let store = Arc::new(TaskStore::new());
        store.upsert_agent(agent("a1", vec!["rust"])).unwrap();
        store.upsert_task(task("low", Priority::Low, &["rust"])).unwrap();
        store.upsert_task(task("urgent", Priority::Urgent, &["rust"])).unwrap();

        let outcome = engine(store).request_next_task("a1").await.unwrap();
        match outcome {
            RequestOutcome::Assigned(a) => assert_eq!(a.task_id, "urgent"),
            _ => panic!("expected an assignment"),
        }
    }

    #[tokio::test]
    async fn at_capacity_returns_reason() {
        let store = Arc::new(TaskStore::new());
        let mut a = agent("a1", vec![]);
        a.capacity = 1;
        store.upsert_agent(a).unwrap();
        store.upsert_task(task("t1", Priority::Medium, &[])).unwrap();
        store.assign("t1", "a1", "x".into(), Utc::now()).unwrap();

        store.upsert_task(task("t2", Priority::Medium, &[])).unwrap();
        let outcome = engine(store).request_next_task("a1").await.unwrap();
        assert_eq!(outcome, RequestOutcome::NoTaskAvailable(NoTaskReason::AtCapacity));
    }

    #[tokio::test]
    async fn no_task_when_store_is_empty() {
        let store = Arc::new(TaskStore::new());
        store.upsert_agent(agent("a1", vec![])).unwrap();
        let outcome = engine(store).request_next_task("a1").await.unwrap();
        assert_eq!(outcome, RequestOutcome::NoTaskAvailable(NoTaskReason::NoTask));
    }

    #[tokio::test]
    async fn concurrent_requests_assign_exactly_once() {
        let store = Arc::new(TaskStore::new());
        store.upsert_task(task("t1", Priority::Medium, &[])).unwrap();
        for i in 0..10 {
            store.upsert_agent(agent(&format!("a{i}"), vec![])).unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let engine = engine(store);
                engine.request_next_task(&format!("a{i}")).await.unwrap()
            }));
        }

        let mut assigned = 0;
        for h in handles {
            if matches!(h.await.unwrap(), RequestOutcome::Assigned(_)) {
                assigned += 1;
            }
        }
        assert_eq!(assigned, 1);
    }

    #[test]
    fn skill_score_is_neutral_without_labels() {
        let t = task("t1", Priority::Medium, &[]);
        let a = agent("a1", vec!["rust"]);
        assert_eq!(AssignmentEngine::skill_score(&t, &a), 0.5);
    }

    #[test]
    fn skill_score_is_fraction_of_overlap() {
        let t = task("t1", Priority::Medium, &["rust", "python"]);
        let a = agent("a1", vec!["rust"]);
        assert_eq!(AssignmentEngine::skill_score(&t, &a), 0.5);
    }
}
