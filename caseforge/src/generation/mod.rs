//! Generation port and the retry discipline around it.
//!
//! [`call_with_retry`] is the single entry point the orchestrator and the
//! revision engine use to reach the external service: it enforces the
//! per-call timeout, retries transport failures with backoff, applies
//! rate-limit cool-downs without consuming attempts, races every wait
//! against run cancellation, and settles usage with the process-wide meter.

pub mod budget;
pub mod port;
pub mod retry;

pub use budget::{BudgetPermit, UsageMeter};
pub use port::{GenerationPort, GenerationRequest, GenerationResponse};
pub use retry::{BackoffStrategy, JitterStrategy, RetryPolicy, RetryState};

use std::time::Duration;

use crate::errors::{CaseforgeError, GenerationError};
use crate::pipeline::CancellationToken;

/// Performs one logical generation call with retries.
///
/// # Errors
///
/// Returns the final [`GenerationError`] once attempts are exhausted, a
/// cancellation error if the owning run is aborted mid-flight, or a budget
/// error if the process-wide cost ceiling is spent.
pub async fn call_with_retry(
    port: &dyn GenerationPort,
    request: &GenerationRequest,
    policy: &RetryPolicy,
    meter: &UsageMeter,
    cancel: &CancellationToken,
) -> Result<GenerationResponse, CaseforgeError> {
    let mut state = RetryState::new();

    loop {
        if cancel.is_cancelled() {
            return Err(GenerationError::cancelled(cancel.reason()).into());
        }

        let permit = meter.checkout()?;
        let deadline = Duration::from_millis(request.timeout_ms);

        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(GenerationError::cancelled(cancel.reason())),
            result = tokio::time::timeout(deadline, port.generate(request)) => {
                result.unwrap_or(Err(GenerationError::Timeout {
                    elapsed_ms: request.timeout_ms,
                }))
            }
        };

        match outcome {
            Ok(response) => {
                permit.record(response.usage);
                return Ok(response);
            }
            Err(err) if err.is_cancelled() => {
                drop(permit);
                return Err(err.into());
            }
            Err(GenerationError::RateLimited { retry_after_ms }) => {
                drop(permit);
                let cooldown = state.record_rate_limit(policy, retry_after_ms);
                tracing::warn!(
                    stage = %request.stage,
                    cooldown_ms = cooldown.as_millis() as u64,
                    "Rate limited, cooling down"
                );
                if sleep_or_cancel(cooldown, cancel).await {
                    return Err(GenerationError::cancelled(cancel.reason()).into());
                }
            }
            Err(err) => {
                drop(permit);
                match state.record_failure(policy) {
                    Some(delay) => {
                        tracing::debug!(
                            stage = %request.stage,
                            attempt = state.attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Retrying generation after failure"
                        );
                        if sleep_or_cancel(delay, cancel).await {
                            return Err(GenerationError::cancelled(cancel.reason()).into());
                        }
                    }
                    None => return Err(err.into()),
                }
            }
        }
    }
}

/// Sleeps for the delay unless cancellation arrives first. Returns true on
/// cancellation.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => true,
        () = tokio::time::sleep(delay) => false,
    }
}
