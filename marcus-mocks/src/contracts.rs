//! Contract test helpers for validating [`BoardProvider`] implementations.
//!
//! Provides a standardized suite that any adapter (Planka, GitHub Projects,
//! Linear, or the in-memory stand-in) should pass, ensuring consistent
//! behavior across vendors against one shared capability-set contract.

use crate::fixtures::new_task_draft;
use marcus_core::{BoardProvider, ProviderError, TaskStatus};

/// Runs every contract check against `provider`.
pub async fn test_provider_contract<P: BoardProvider>(provider: &P) {
    test_create_contract(provider).await;
    test_update_status_contract(provider).await;
    test_get_task_contract(provider).await;
    test_list_available_contract(provider).await;
    test_comment_contract(provider).await;
    test_assignee_contract(provider).await;
    test_board_summary_contract(provider).await;
}

/// Test task creation contract: the provider returns a fully populated task
/// with a provider-assigned id and TODO status.
pub async fn test_create_contract<P: BoardProvider>(provider: &P) {
    let draft = new_task_draft("Create contract task");
    let task = provider.create_task(draft.clone()).await.expect("create_task should succeed");

    assert!(!task.id.is_empty(), "created task should have a provider-assigned id");
    assert_eq!(task.name, draft.name, "created task should preserve name");
    assert_eq!(task.status, TaskStatus::Todo, "new task should start TODO");
    assert!(task.assigned_to.is_none(), "new task should be unassigned");
}

/// Test the status-move contract, including rejecting unknown task ids.
pub async fn test_update_status_contract<P: BoardProvider>(provider: &P) {
    let task = provider.create_task(new_task_draft("Status contract task")).await.expect("create should succeed");

    provider.update_status(&task.id, TaskStatus::InProgress).await.expect("status move should succeed");
    let refreshed = provider.get_task(&task.id).await.expect("get_task should succeed");
    assert_eq!(refreshed.status, TaskStatus::InProgress);

    let not_found = provider.update_status("does-not-exist", TaskStatus::Done).await;
    assert!(matches!(not_found, Err(ProviderError::NotFound(_))), "unknown task id should surface NotFound");
}

/// Test get-by-id, including the not-found path.
pub async fn test_get_task_contract<P: BoardProvider>(provider: &P) {
    let task = provider.create_task(new_task_draft("Get contract task")).await.expect("create should succeed");

    let fetched = provider.get_task(&task.id).await.expect("get_task should succeed for a known id");
    assert_eq!(fetched.id, task.id);

    let missing = provider.get_task("does-not-exist").await;
    assert!(matches!(missing, Err(ProviderError::NotFound(_))));
}

/// Test that a freshly created task appears in `list_available_tasks`.
pub async fn test_list_available_contract<P: BoardProvider>(provider: &P) {
    let task = provider.create_task(new_task_draft("List contract task")).await.expect("create should succeed");

    let available = provider.list_available_tasks().await.expect("list_available_tasks should succeed");
    assert!(available.iter().any(|t| t.id == task.id), "newly created TODO task should be listed as available");
}

/// Test the append-only comment contract.
pub async fn test_comment_contract<P: BoardProvider>(provider: &P) {
    let task = provider.create_task(new_task_draft("Comment contract task")).await.expect("create should succeed");
    provider.add_comment(&task.id, "first").await.expect("add_comment should succeed");
    provider.add_comment(&task.id, "second").await.expect("add_comment should succeed");
}

/// Test the assignee contract; adapters without native assignees still must
/// not error, since they're allowed to fall back to a comment.
pub async fn test_assignee_contract<P: BoardProvider>(provider: &P) {
    let task = provider.create_task(new_task_draft("Assignee contract task")).await.expect("create should succeed");
    provider.set_assignee(&task.id, Some("agent-1")).await.expect("set_assignee should succeed");
    provider.set_assignee(&task.id, None).await.expect("clearing the assignee should succeed");
}

/// Test the board summary contract reports at least the tasks we created.
pub async fn test_board_summary_contract<P: BoardProvider>(provider: &P) {
    provider.create_task(new_task_draft("Summary contract task")).await.expect("create should succeed");
    let summary = provider.get_board_summary().await.expect("get_board_summary should succeed");
    assert!(summary.total_tasks >= 1, "should report at least one task");
}
