//! The Board Provider interface: the one contract every external kanban
//! vendor adapter must satisfy.

use crate::models::{Task, TaskDraft, TaskStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Aggregate counts reported by a provider, independent of Marcus's own view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardSummary {
    pub counts_by_status: std::collections::BTreeMap<String, usize>,
    pub total_tasks: usize,
}

/// Board Provider failure, distinct from [`crate::error::MarcusError`]: this is
/// the raw classification an adapter reports; callers turn it into a
/// `MarcusError::Provider{Transient,Fatal}` after consulting the circuit breaker.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("transient provider error: {0}")]
    Transient(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    pub fn kind(&self) -> crate::circuit_breaker::ProviderFailureKind {
        use crate::circuit_breaker::ProviderFailureKind as K;
        match self {
            ProviderError::Transient(_) => K::Transient,
            ProviderError::NotFound(_) => K::NotFound,
            ProviderError::Conflict(_) => K::Conflict,
            ProviderError::PermissionDenied(_) => K::PermissionDenied,
            ProviderError::MalformedResponse(_) => K::MalformedResponse,
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Capability set every vendor adapter (Planka, GitHub Projects, Linear, or an
/// in-memory stand-in) must implement. All operations are idempotent where the
/// underlying vendor API allows it.
#[async_trait]
pub trait BoardProvider: Send + Sync {
    /// Human-readable provider name, used in `get_project_status`'s response.
    fn name(&self) -> &str;

    /// Tasks the provider considers open/ready. Ordering is not guaranteed.
    async fn list_available_tasks(&self) -> ProviderResult<Vec<Task>>;

    async fn get_task(&self, task_id: &str) -> ProviderResult<Task>;

    /// Create a task from a draft. Returns a fully populated Task with a
    /// provider-assigned id; the draft's `dependencies` are external ids
    /// resolved by the caller after a batch is created.
    async fn create_task(&self, draft: TaskDraft) -> ProviderResult<Task>;

    /// Move the external card to the column mapped from `status`.
    async fn update_status(&self, task_id: &str, status: TaskStatus) -> ProviderResult<()>;

    /// Append-only comment; the cross-provider substitute for structured
    /// fields (progress percentages, blocker notes, time logs).
    async fn add_comment(&self, task_id: &str, text: &str) -> ProviderResult<()>;

    /// Record an assignee. Adapters lacking native assignees fall back to a comment.
    async fn set_assignee(&self, task_id: &str, agent_id: Option<&str>) -> ProviderResult<()>;

    async fn get_board_summary(&self) -> ProviderResult<BoardSummary>;
}

/// Parses an adapter-local priority label set into a [`crate::models::Priority`].
/// Unknown labels default to `Medium`.
pub fn parse_priority_label(
    labels: &std::collections::BTreeSet<String>,
    table: &[(&str, crate::models::Priority)],
) -> crate::models::Priority {
    for (label, priority) in table {
        if labels.iter().any(|l| l.eq_ignore_ascii_case(label)) {
            return *priority;
        }
    }
    crate::models::Priority::Medium
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    #[test]
    fn unknown_label_defaults_to_medium() {
        let labels: std::collections::BTreeSet<String> =
            ["unrelated".to_string()].into_iter().collect();
        let table = [("P0", Priority::Urgent), ("High", Priority::High)];
        assert_eq!(parse_priority_label(&labels, &table), Priority::Medium);
    }

    #[test]
    fn known_label_is_case_insensitive() {
        let labels: std::collections::BTreeSet<String> = ["critical".to_string()].into_iter().collect();
        let table = [("CRITICAL", Priority::Urgent)];
        assert_eq!(parse_priority_label(&labels, &table), Priority::Urgent);
    }

    #[test]
    fn provider_error_kind_mapping() {
        use crate::circuit_breaker::ProviderFailureKind as K;
        assert!(matches!(ProviderError::Transient("x".into()).kind(), K::Transient));
        assert!(matches!(ProviderError::Conflict("x".into()).kind(), K::Conflict));
    }
}
