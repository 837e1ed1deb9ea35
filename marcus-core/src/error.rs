use std::fmt;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, MarcusError>;

/// Cross-component error kinds.
///
/// Every variant maps to a `tool_error_kind` string surfaced to the caller
/// by the Tool Dispatcher; the dispatcher is the only place this mapping
/// happens, so the core itself never needs to know about wire formats.
///
/// # Examples
///
/// ```rust
/// use marcus_core::error::MarcusError;
///
/// let err = MarcusError::not_found("task", "t-42");
/// assert!(err.is_not_found());
/// assert_eq!(err.kind(), "not_found");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarcusError {
    /// Caller-supplied data violates schema or domain rules.
    #[error("validation error: {0}")]
    Validation(String),

    /// Task or agent id unknown.
    #[error("{0} not found: {1}")]
    NotFound(String, String),

    /// Progress/blocker reported on a task the agent does not own.
    #[error("agent {0} does not own task {1}")]
    NotAssigned(String, String),

    /// Lifecycle transition rejected.
    #[error("invalid transition from {0} to {1}")]
    InvalidTransition(String, String),

    /// Lost an assignment race after the retry budget was exhausted.
    #[error("contention: {0}")]
    Contention(String),

    /// Board Provider call failed in a way expected to clear on retry.
    #[error("provider transient error: {0}")]
    ProviderTransient(String),

    /// Board Provider call failed fatally (permission, configuration).
    #[error("provider fatal error: {0}")]
    ProviderFatal(String),

    /// A deadline (dispatcher or AI Advisor) expired.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarcusError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound(entity.into(), id.into())
    }

    pub fn not_assigned(agent_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self::NotAssigned(agent_id.into(), task_id.into())
    }

    pub fn invalid_transition(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::InvalidTransition(from.to_string(), to.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("field '{field}' cannot be empty"))
    }

    pub fn contention(task_id: impl Into<String>) -> Self {
        Self::Contention(format!("lost assignment race for task {}", task_id.into()))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MarcusError::NotFound(_, _))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, MarcusError::Validation(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, MarcusError::ProviderTransient(_) | MarcusError::Timeout(_))
    }

    /// Wire-facing error kind tag, assigned by the Tool Dispatcher.
    pub fn kind(&self) -> &'static str {
        match self {
            MarcusError::Validation(_) => "validation_error",
            MarcusError::NotFound(_, _) => "not_found",
            MarcusError::NotAssigned(_, _) => "not_assigned",
            MarcusError::InvalidTransition(_, _) => "invalid_transition",
            MarcusError::Contention(_) => "contention",
            MarcusError::ProviderTransient(_) => "provider_transient",
            MarcusError::ProviderFatal(_) => "provider_fatal",
            MarcusError::Timeout(_) => "timeout",
            MarcusError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_and_predicates() {
        let err = MarcusError::not_found("task", "t-1");
        assert!(err.is_not_found());
        assert_eq!(err.kind(), "not_found");

        let err = MarcusError::not_assigned("a1", "t1");
        assert_eq!(err, MarcusError::NotAssigned("a1".into(), "t1".into()));

        let err = MarcusError::validation("bad input");
        assert!(err.is_validation());
    }

    #[test]
    fn transient_classification() {
        assert!(MarcusError::ProviderTransient("x".into()).is_transient());
        assert!(MarcusError::Timeout("x".into()).is_transient());
        assert!(!MarcusError::ProviderFatal("x".into()).is_transient());
    }

    #[test]
    fn display_messages() {
        let err = MarcusError::NotFound("task".into(), "t1".into());
        assert_eq!(err.to_string(), "task not found: t1");
    }
}
