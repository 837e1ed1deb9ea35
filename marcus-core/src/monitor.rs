//! Project Monitor: aggregate metrics derived from a Task Store snapshot,
//! plus a refresh-then-aggregate entry point for callers who want the
//! freshest possible view.

use crate::board_provider::BoardProvider;
use crate::error::Result;
use crate::models::{ProjectView, TaskStatus};
use crate::reconciliation::refresh_from_board;
use crate::store::TaskStore;
use chrono::{DateTime, Utc};

/// Pure aggregation over a Task Store snapshot. Takes no provider calls;
/// `refresh_project_state` does that separately via [`refresh_and_get_status`].
pub fn get_project_status(store: &TaskStore) -> ProjectView {
    let mut view = store.snapshot();
    view.stale_tasks = stale_task_ids(store, Utc::now());
    view
}

/// Pulls the provider first, then aggregates — the explicit-refresh path
/// behind the `refresh_project_state` tool.
pub async fn refresh_and_get_status(store: &TaskStore, provider: &dyn BoardProvider) -> Result<ProjectView> {
    refresh_from_board(store, provider).await?;
    Ok(get_project_status(store))
}

/// Tasks overdue against their `due_date`, independent of staleness via
/// agent heartbeat — this is a due-date-driven view used in `ProjectView`.
fn stale_task_ids(store: &TaskStore, now: DateTime<Utc>) -> Vec<String> {
    store
        .all_tasks()
        .into_iter()
        .filter(|t| t.status != TaskStatus::Done)
        .filter(|t| t.due_date.map(|d| d < now).unwrap_or(false))
        .map(|t| t.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, Task};
    use std::collections::BTreeSet;

    fn overdue_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            status: TaskStatus::InProgress,
            priority: Priority::Medium,
            labels: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            estimated_hours: 0.0,
            actual_hours: 0.0,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            due_date: Some(Utc::now() - chrono::Duration::days(1)),
        }
    }

    #[test]
    fn project_status_reports_overdue_tasks() {
        let store = TaskStore::new();
        store.upsert_task(overdue_task("t1")).unwrap();
        let view = get_project_status(&store);
        assert_eq!(view.stale_tasks, vec!["t1".to_string()]);
    }

    #[test]
    fn completion_percentage_reflects_done_tasks() {
        let store = TaskStore::new();
        store.upsert_task(overdue_task("t1")).unwrap();
        store.set_status("t1", TaskStatus::Blocked, Utc::now()).unwrap();
        let view = get_project_status(&store);
        assert_eq!(view.completion_percentage, 0.0);
    }
}
