//! Reconciliation: keeping Task Store state and Board Provider state in
//! agreement after failure or drift.

use crate::board_provider::BoardProvider;
use crate::models::TaskStatus;
use crate::store::TaskStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{info, warn};

/// A mirror move that failed and is waiting to be retried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PushKey {
    task_id: String,
    target_status: TaskStatus,
}

/// Queue of failed mirror pushes, deduplicated by `(task_id, target_status)`
/// so repeated identical moves coalesce into one pending retry.
pub struct PushRetryQueue {
    pending: Mutex<HashMap<PushKey, u32>>,
    retry_limit: u32,
}

impl PushRetryQueue {
    pub fn new(retry_limit: u32) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            retry_limit,
        }
    }

    pub fn enqueue(&self, task_id: String, target_status: TaskStatus) {
        let key = PushKey { task_id, target_status };
        self.pending.lock().entry(key).or_insert(0);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drain and attempt every pending push once against `provider`. Pushes
    /// that fail again are re-enqueued with an incremented attempt count
    /// unless the retry limit has been exhausted, in which case they are
    /// dropped with a logged give-up. There is no exactly-once guarantee
    /// here, only idempotent reconciliation on the next pull.
    pub async fn drain_once(&self, provider: &dyn BoardProvider) {
        let batch: Vec<(PushKey, u32)> = {
            let mut pending = self.pending.lock();
            pending.drain().collect()
        };

        for (key, attempts) in batch {
            match provider.update_status(&key.task_id, key.target_status).await {
                Ok(()) => {
                    info!(task_id = %key.task_id, status = ?key.target_status, "push retry succeeded");
                }
                Err(e) => {
                    let next_attempts = attempts + 1;
                    if next_attempts >= self.retry_limit {
                        warn!(task_id = %key.task_id, status = ?key.target_status, error = %e, "push retry exhausted, giving up");
                    } else {
                        self.pending.lock().insert(key, next_attempts);
                    }
                }
            }
        }
    }
}

/// Pulls the provider's view of every task it knows about and reconciles it
/// into the Task Store.
pub async fn refresh_from_board(store: &TaskStore, provider: &dyn BoardProvider) -> Result<(), crate::error::MarcusError> {
    let external_tasks = provider
        .list_available_tasks()
        .await
        .map_err(|e| crate::error::MarcusError::ProviderTransient(e.to_string()))?;

    for external in external_tasks {
        match store.get_task(&external.id) {
            None => {
                // Present externally but missing internally: insert.
                store.upsert_task(external)?;
            }
            Some(internal) => {
                if internal.status == TaskStatus::InProgress && external.status == TaskStatus::Todo {
                    // Conflict: internal in-progress, external back at a TODO-like
                    // column. External wins for status; internal assignment clears.
                    store.force_status(&internal.id, TaskStatus::Todo, chrono::Utc::now())?;
                    store.clear_assignment(&internal.id)?;
                    info!(task_id = %internal.id, "reconciliation: external status wins, assignment cleared");
                } else if external.status != internal.status {
                    // Any other drift: the board is the source of truth for
                    // status. `force_status` bypasses the normal transition
                    // table because board drift can legitimately
                    // skip states the internal machine never passes through
                    // directly (e.g. Blocked -> Done via the UI), and this is
                    // the one path explicitly allowed to do so.
                    store.force_status(&internal.id, external.status, chrono::Utc::now())?;
                    if external.status == TaskStatus::Done || external.status == TaskStatus::Todo {
                        store.clear_assignment(&internal.id).ok();
                    }
                    info!(task_id = %internal.id, new_status = ?external.status, "reconciliation: adopted external status");
                } else if internal.assigned_to.is_some() {
                    // Internal assignment not reflected externally: re-apply.
                    if let Err(e) = provider.set_assignee(&internal.id, internal.assigned_to.as_deref()).await {
                        warn!(task_id = %internal.id, error = %e, "failed to re-apply assignee during reconciliation");
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board_provider::{BoardSummary, ProviderError, ProviderResult};
    use crate::models::{Priority, Task, TaskDraft};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn dedup_keeps_one_entry_per_task_status_pair() {
        let queue = PushRetryQueue::new(5);
        queue.enqueue("t1".into(), TaskStatus::Done);
        queue.enqueue("t1".into(), TaskStatus::Done);
        assert_eq!(queue.pending_count(), 1);
    }

    struct DriftingProvider {
        tasks: StdMutex<Vec<Task>>,
    }

    #[async_trait]
    impl BoardProvider for DriftingProvider {
        fn name(&self) -> &str {
            "drifting"
        }
        async fn list_available_tasks(&self) -> ProviderResult<Vec<Task>> {
            Ok(self.tasks.lock().unwrap().clone())
        }
        async fn get_task(&self, task_id: &str) -> ProviderResult<Task> {
            self.tasks
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id == task_id)
                .cloned()
                .ok_or_else(|| ProviderError::NotFound(task_id.to_string()))
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

    fn task(id: &str, status: TaskStatus, assigned_to: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            status,
            priority: Priority::Medium,
            labels: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            estimated_hours: 0.0,
            actual_hours: 0.0,
            assigned_to: assigned_to.map(str::to_string),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            due_date: None,
        }
    }

    /// A card moved straight from a blocked column to Done on the board UI
    /// is not a transition the internal machine ever makes directly
    /// (`Blocked -> Done` is not in `Task::can_transition_to`'s table), but
    /// reconciliation must still converge on it rather than error out.
    #[tokio::test]
    async fn converges_on_a_drift_the_internal_machine_never_transitions_through() {
        let store = TaskStore::new();
        store.upsert_task(task("t1", TaskStatus::Blocked, Some("a1"))).unwrap();
        let provider = DriftingProvider {
            tasks: StdMutex::new(vec![task("t1", TaskStatus::Done, None)]),
        };

        refresh_from_board(&store, &provider).await.unwrap();

        let reconciled = store.get_task("t1").unwrap();
        assert_eq!(reconciled.status, TaskStatus::Done);
        assert!(reconciled.assigned_to.is_none());
    }
}
