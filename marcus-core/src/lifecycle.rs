//! The Lifecycle State Machine: the only component that moves a task's
//! status and, in doing so, mirrors the move to the Board Provider.

use crate::board_provider::BoardProvider;
use crate::error::Result;
use crate::models::{Task, TaskStatus};
use crate::reconciliation::PushRetryQueue;
use crate::store::TaskStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct LifecycleStateMachine {
    store: Arc<TaskStore>,
    provider: Arc<dyn BoardProvider>,
    push_retry: Arc<PushRetryQueue>,
}

impl LifecycleStateMachine {
    pub fn new(store: Arc<TaskStore>, provider: Arc<dyn BoardProvider>, push_retry: Arc<PushRetryQueue>) -> Self {
        Self {
            store,
            provider,
            push_retry,
        }
    }

    /// Apply `new_status` to `task_id` and mirror it externally.
    ///
    /// Provider failures during the mirror do not roll back the internal
    /// transition: the move is queued for the background push-retry worker
    /// and the caller observes the internal state as final.
    pub async fn transition(&self, task_id: &str, new_status: TaskStatus, comment: &str) -> Result<Task> {
        let now = Utc::now();
        let from = self.store.get_task(task_id).map(|t| t.status);
        let task = self.store.set_status(task_id, new_status, now)?;

        if let Err(e) = self.provider.update_status(task_id, new_status).await {
            warn!(task_id, ?new_status, error = %e, "provider mirror failed, queuing push retry");
            self.push_retry.enqueue(task_id.to_string(), new_status);
        } else if !comment.is_empty() {
            if let Err(e) = self.provider.add_comment(task_id, comment).await {
                warn!(task_id, error = %e, "comment mirror failed");
            }
        }

        info!(task_id, ?from, to = ?new_status, "task transition");
        Ok(task)
    }
}
