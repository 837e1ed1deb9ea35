//! Progress & Blocker Handler: ingests progress updates, completion reports
//! and blocker reports from agents, invoking the AI Advisor for
//! blocker-resolution suggestions.

use crate::advisor::{suggest_resolutions_with_fallback, AiAdvisor};
use crate::board_provider::BoardProvider;
use crate::error::{MarcusError, Result};
use crate::lifecycle::LifecycleStateMachine;
use crate::models::{Blocker, Severity, Task, TaskStatus};
use crate::store::TaskStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Outcome of `report_progress`: whether the task advanced to DONE.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOutcome {
    pub task: Task,
    pub completed: bool,
}

pub struct ProgressHandler {
    store: Arc<TaskStore>,
    lifecycle: Arc<LifecycleStateMachine>,
    provider: Arc<dyn BoardProvider>,
    advisor: Arc<dyn AiAdvisor>,
}

impl ProgressHandler {
    pub fn new(
        store: Arc<TaskStore>,
        lifecycle: Arc<LifecycleStateMachine>,
        provider: Arc<dyn BoardProvider>,
        advisor: Arc<dyn AiAdvisor>,
    ) -> Self {
        Self {
            store,
            lifecycle,
            provider,
            advisor,
        }
    }

    fn verify_ownership(&self, agent_id: &str, task_id: &str) -> Result<Task> {
        let task = self.store.get_task(task_id).ok_or_else(|| MarcusError::not_found("task", task_id))?;
        if task.assigned_to.as_deref() != Some(agent_id) {
            return Err(MarcusError::not_assigned(agent_id, task_id));
        }
        Ok(task)
    }

    /// Reports progress on an assigned task. Completion (status=="completed"
    /// or percent==100) is idempotent: re-reporting completion of an already
    /// DONE task is a success no-op rather than an error.
    pub async fn report_progress(
        &self,
        agent_id: &str,
        task_id: &str,
        status: &str,
        percent: u8,
        message: Option<&str>,
        actual_hours: Option<f64>,
    ) -> Result<ProgressOutcome> {
        crate::validation::Validator::validate_progress_percent(percent)?;

        let task = match self.store.get_task(task_id) {
            Some(t) if t.status == TaskStatus::Done => {
                return Ok(ProgressOutcome { task: t, completed: true });
            }
            _ => self.verify_ownership(agent_id, task_id)?,
        };

        let is_completion = status == "completed" || percent == 100;

        if is_completion {
            let comment = format!("completed: {}", message.unwrap_or("done"));
            let done = self.lifecycle.transition(task_id, TaskStatus::Done, &comment).await?;
            self.store.clear_assignment(task_id)?;
            self.store.increment_completed_count(agent_id)?;
            self.store.touch_agent_heartbeat(agent_id, Utc::now())?;
            info!(task_id, agent_id, "task completed");
            Ok(ProgressOutcome { task: done, completed: true })
        } else {
            if let Some(hours) = actual_hours {
                self.store.set_actual_hours(task_id, hours)?;
            }
            let comment = format!("{percent}% — {}", message.unwrap_or(""));
            if let Err(e) = self.provider.add_comment(task_id, &comment).await {
                tracing::warn!(task_id, error = %e, "progress comment mirror failed");
            }
            self.store.touch_task_updated(task_id, Utc::now())?;
            self.store.touch_agent_heartbeat(agent_id, Utc::now())?;
            let _ = task;
            Ok(ProgressOutcome {
                task: self.store.get_task(task_id).expect("task exists"),
                completed: false,
            })
        }
    }

    /// `report_blocker`: transitions IN_PROGRESS->BLOCKED and
    /// consults the AI Advisor (with deterministic fallback) for suggestions.
    pub async fn report_blocker(
        &self,
        agent_id: &str,
        task_id: &str,
        description: &str,
        severity: Severity,
        blocker_id: String,
    ) -> Result<Blocker> {
        let task = self.verify_ownership(agent_id, task_id)?;
        let comment = format!("BLOCKED [{severity}]: {description}");
        self.lifecycle.transition(task_id, TaskStatus::Blocked, &comment).await?;

        let suggestions = suggest_resolutions_with_fallback(self.advisor.as_ref(), &task, description, severity).await;

        let blocker = Blocker {
            id: blocker_id,
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            description: description.to_string(),
            severity,
            opened_at: Utc::now(),
            resolved_at: None,
            suggestions: suggestions.clone(),
        };
        self.store.record_blocker(blocker.clone());
        info!(task_id, agent_id, ?severity, "blocker reported");
        Ok(blocker)
    }

    /// `resolve_blocker`: BLOCKED -> IN_PROGRESS.
    pub async fn resolve_blocker(&self, task_id: &str) -> Result<Task> {
        let task = self.lifecycle.transition(task_id, TaskStatus::InProgress, "blocker resolved").await?;
        self.store.resolve_blocker(task_id, Utc::now())?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::FallbackAdvisor;
    use crate::board_provider::{BoardSummary, ProviderError, ProviderResult};
    use crate::models::{Agent, Priority, TaskDraft};
    use crate::reconciliation::PushRetryQueue;
    use async_trait::async_trait;
    use std::collections::BTreeSet;

    struct NoopProvider;

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

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            labels: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            estimated_hours: 0.0,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            due_date: None,
        }
    }

    fn handler() -> (Arc<TaskStore>, ProgressHandler) {
        let store = Arc::new(TaskStore::new());
        let provider: Arc<dyn BoardProvider> = Arc::new(NoopProvider);
        let lifecycle = Arc::new(LifecycleStateMachine::new(store.clone(), provider.clone(), Arc::new(PushRetryQueue::new(5))));
        let advisor: Arc<dyn AiAdvisor> = Arc::new(FallbackAdvisor);
        let h = ProgressHandler::new(store.clone(), lifecycle, provider, advisor);
        (store, h)
    }

    #[tokio::test]
    async fn progress_on_unowned_task_is_rejected() {
        let (store, handler) = handler();
        store.upsert_agent(Agent::new("a1", "a1", "coder", vec![])).unwrap();
        store.upsert_task(task("t1")).unwrap();

        let err = handler.report_progress("a1", "t1", "in_progress", 50, None, None).await.unwrap_err();
        assert!(matches!(err, MarcusError::NotAssigned(_, _)));
    }

    #[tokio::test]
    async fn completion_is_idempotent() {
        let (store, handler) = handler();
        store.upsert_agent(Agent::new("a1", "a1", "coder", vec![])).unwrap();
        store.upsert_task(task("t1")).unwrap();
        store.assign("t1", "a1", "x".into(), Utc::now()).unwrap();

        let first = handler.report_progress("a1", "t1", "completed", 100, None, None).await.unwrap();
        assert!(first.completed);
        assert_eq!(store.get_agent("a1").unwrap().completed_count, 1);

        let second = handler.report_progress("a1", "t1", "completed", 100, None, None).await.unwrap();
        assert!(second.completed);
        // Completed_count must not increment a second time.
        assert_eq!(store.get_agent("a1").unwrap().completed_count, 1);
    }

    #[tokio::test]
    async fn blocker_cycle_round_trips_to_in_progress() {
        let (store, handler) = handler();
        store.upsert_agent(Agent::new("a1", "a1", "coder", vec![])).unwrap();
        store.upsert_task(task("t1")).unwrap();
        store.assign("t1", "a1", "x".into(), Utc::now()).unwrap();

        let blocker = handler
            .report_blocker("a1", "t1", "db offline", Severity::High, "b1".into())
            .await
            .unwrap();
        assert!(!blocker.suggestions.is_empty());
        assert_eq!(store.get_task("t1").unwrap().status, TaskStatus::Blocked);

        let resolved = handler.resolve_blocker("t1").await.unwrap();
        assert_eq!(resolved.status, TaskStatus::InProgress);
    }
}
