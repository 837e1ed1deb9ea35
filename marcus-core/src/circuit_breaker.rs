//! Failure classification and retry/backoff policy for Board Provider calls.
//!
//! Shaped after a per-failure-type threshold/backoff breaker: each provider
//! failure kind has its own retry budget and its own action once that budget
//! is spent, rather than one global retry counter for every kind of failure.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Board Provider failure taxonomy.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderFailureKind {
    /// Network error, 5xx, or rate-limit — expected to clear on retry.
    Transient,
    /// The requested resource does not exist on the board.
    NotFound,
    /// Version mismatch; a refresh-then-retry-once is appropriate.
    Conflict,
    /// Credentials/permissions reject the call; not retryable.
    PermissionDenied,
    /// Response could not be parsed into a normalized shape.
    MalformedResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Closed,
    Open,
}

/// Per-provider-connection failure tracker.
///
/// One `ProviderCircuitBreaker` is held per adapter instance; it does not
/// track failures per task, only per call-kind, since provider outages are
/// connection-wide rather than task-specific.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCircuitBreaker {
    retry_limits: HashMap<ProviderFailureKind, u32>,
    attempt_counts: HashMap<ProviderFailureKind, u32>,
    state: BreakerState,
    /// Tracks whether a MalformedResponse has already been seen once, since
    /// the first occurrence is transient but a repeat is fatal.
    malformed_seen_once: bool,
}

impl Default for ProviderCircuitBreaker {
    fn default() -> Self {
        let mut retry_limits = HashMap::new();
        retry_limits.insert(ProviderFailureKind::Transient, 5);
        retry_limits.insert(ProviderFailureKind::Conflict, 1);
        retry_limits.insert(ProviderFailureKind::NotFound, 0);
        retry_limits.insert(ProviderFailureKind::PermissionDenied, 0);
        retry_limits.insert(ProviderFailureKind::MalformedResponse, 1);

        Self {
            retry_limits,
            attempt_counts: HashMap::new(),
            state: BreakerState::Closed,
            malformed_seen_once: false,
        }
    }
}

/// What the caller should do after a failed provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderAction {
    /// Retry after `delay_seconds`, capped exponential backoff.
    Retry { delay_seconds: u64 },
    /// Refresh local state from the provider, then retry exactly once.
    RefreshAndRetryOnce,
    /// Surface the failure to the caller; retry budget exhausted or kind is non-retryable.
    Surface,
}

impl ProviderCircuitBreaker {
    pub fn new(retry_limits: HashMap<ProviderFailureKind, u32>) -> Self {
        Self {
            retry_limits,
            attempt_counts: HashMap::new(),
            state: BreakerState::Closed,
            malformed_seen_once: false,
        }
    }

    /// Record a failure of `kind` and decide the next action.
    pub fn record_failure(&mut self, kind: ProviderFailureKind) -> ProviderAction {
        match kind {
            ProviderFailureKind::NotFound | ProviderFailureKind::PermissionDenied => {
                self.state = BreakerState::Open;
                ProviderAction::Surface
            }
            ProviderFailureKind::Conflict => {
                // "Refresh + retry once" — tracked like Transient so a
                // persistent conflict eventually surfaces instead of looping
                // forever through refresh-and-retry.
                let count = self.attempt_counts.entry(kind).or_insert(0);
                *count += 1;
                let limit = self.retry_limits.get(&kind).copied().unwrap_or(1);
                if *count > limit {
                    self.state = BreakerState::Open;
                    ProviderAction::Surface
                } else {
                    ProviderAction::RefreshAndRetryOnce
                }
            }
            ProviderFailureKind::MalformedResponse => {
                if self.malformed_seen_once {
                    self.state = BreakerState::Open;
                    ProviderAction::Surface
                } else {
                    self.malformed_seen_once = true;
                    ProviderAction::Retry { delay_seconds: 1 }
                }
            }
            ProviderFailureKind::Transient => {
                let count = self.attempt_counts.entry(kind).or_insert(0);
                *count += 1;
                let limit = self.retry_limits.get(&kind).copied().unwrap_or(5);
                if *count > limit {
                    self.state = BreakerState::Open;
                    ProviderAction::Surface
                } else {
                    ProviderAction::Retry {
                        delay_seconds: Self::backoff_seconds(*count),
                    }
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.attempt_counts.clear();
        self.malformed_seen_once = false;
        self.state = BreakerState::Closed;
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Capped exponential backoff: 2, 4, 8, ... seconds, capped at 60.
    fn backoff_seconds(attempt: u32) -> u64 {
        (2_u64.saturating_pow(attempt)).min(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_retries_then_surfaces() {
        let mut cb = ProviderCircuitBreaker::default();
        for _ in 0..5 {
            let action = cb.record_failure(ProviderFailureKind::Transient);
            assert!(matches!(action, ProviderAction::Retry { .. }));
        }
        let action = cb.record_failure(ProviderFailureKind::Transient);
        assert_eq!(action, ProviderAction::Surface);
        assert_eq!(cb.state(), BreakerState::Open);
    }

    #[test]
    fn conflict_refreshes_and_retries_once_then_surfaces() {
        let mut cb = ProviderCircuitBreaker::default();
        assert_eq!(
            cb.record_failure(ProviderFailureKind::Conflict),
            ProviderAction::RefreshAndRetryOnce
        );
        // A second, still-unresolved conflict exhausts the one-retry budget.
        assert_eq!(cb.record_failure(ProviderFailureKind::Conflict), ProviderAction::Surface);
        assert_eq!(cb.state(), BreakerState::Open);
    }

    #[test]
    fn not_found_and_permission_denied_surface_immediately() {
        let mut cb = ProviderCircuitBreaker::default();
        assert_eq!(cb.record_failure(ProviderFailureKind::NotFound), ProviderAction::Surface);
        let mut cb2 = ProviderCircuitBreaker::default();
        assert_eq!(
            cb2.record_failure(ProviderFailureKind::PermissionDenied),
            ProviderAction::Surface
        );
    }

    #[test]
    fn malformed_response_transient_once_then_fatal() {
        let mut cb = ProviderCircuitBreaker::default();
        assert!(matches!(
            cb.record_failure(ProviderFailureKind::MalformedResponse),
            ProviderAction::Retry { .. }
        ));
        assert_eq!(
            cb.record_failure(ProviderFailureKind::MalformedResponse),
            ProviderAction::Surface
        );
    }

    #[test]
    fn success_resets_state() {
        let mut cb = ProviderCircuitBreaker::default();
        cb.record_failure(ProviderFailureKind::Transient);
        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }
}
