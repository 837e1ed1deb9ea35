//! Shared HTTP retry/backoff helper used by every vendor adapter instead of
//! each adapter re-implementing its own retry loop.
//!
//! Wraps a fallible async call, classifying failures through
//! [`marcus_core::circuit_breaker::ProviderCircuitBreaker`] and retrying
//! according to the action it returns: capped exponential backoff for
//! transient failures, one bare retry for a conflict, and immediate
//! surfacing for anything non-retryable.

use marcus_core::circuit_breaker::{ProviderAction, ProviderCircuitBreaker};
use marcus_core::{ProviderError, ProviderResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Runs `make_call` to completion, retrying transient/conflict failures per
/// the circuit breaker's policy. `make_call` is invoked fresh on every
/// attempt since a `reqwest::RequestBuilder` cannot be replayed.
pub async fn with_retry<T, F, Fut>(operation: &str, mut make_call: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut breaker = ProviderCircuitBreaker::default();
    loop {
        match make_call().await {
            Ok(value) => return Ok(value),
            Err(err) => match breaker.record_failure(err.kind()) {
                ProviderAction::Retry { delay_seconds } => {
                    warn!(operation, error = %err, delay_seconds, "provider call failed, retrying");
                    tokio::time::sleep(Duration::from_secs(delay_seconds)).await;
                }
                ProviderAction::RefreshAndRetryOnce => {
                    warn!(operation, error = %err, "provider call conflicted, retrying once");
                }
                ProviderAction::Surface => return Err(err),
            },
        }
    }
}
