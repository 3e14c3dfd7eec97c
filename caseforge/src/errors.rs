//! Error taxonomy for the caseforge control plane.
//!
//! Transport failures, malformed output, and rate limits originate at the
//! generation port; validation failures are carried by reports rather than
//! errors; stage failures and gate blocks are surfaced as structured reports
//! with a human-readable reason list.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stages::StageName;

/// The main error type for caseforge operations.
#[derive(Debug, Error)]
pub enum CaseforgeError {
    /// A persistence operation failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// A generation port call failed terminally.
    #[error("{0}")]
    Generation(#[from] GenerationError),

    /// The process-wide usage budget is exhausted.
    #[error("{0}")]
    Budget(#[from] BudgetExhaustedError),

    /// The pipeline configuration is invalid.
    #[error("Invalid pipeline configuration: {0}")]
    Config(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors returned by the generation port.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum GenerationError {
    /// The service was unreachable or the connection failed.
    #[error("Transport failure: {message}")]
    Transport {
        /// Description of the transport problem.
        message: String,
    },

    /// The call exceeded its deadline.
    #[error("Generation timed out after {elapsed_ms}ms")]
    Timeout {
        /// Elapsed time before the deadline fired.
        elapsed_ms: u64,
    },

    /// The service reported a rate limit.
    #[error("Rate limit exceeded")]
    RateLimited {
        /// Server-suggested cool-down, when provided.
        retry_after_ms: Option<u64>,
    },

    /// The owning run was cancelled while the call was in flight.
    #[error("Generation cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },
}

impl GenerationError {
    /// Creates a transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Returns true for rate-limit responses, which cool down without
    /// consuming an attempt.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns true when the owning run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Errors raised by an artifact store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The requested run is unknown to the store.
    #[error("Unknown run: {run_id}")]
    UnknownRun {
        /// The missing run id.
        run_id: String,
    },

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backing medium rejected the write.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Error raised when the process-wide budget refuses a checkout.
#[derive(Debug, Clone, Error)]
#[error("Usage budget exhausted: spent {spent:.4} of ceiling {ceiling:.4}")]
pub struct BudgetExhaustedError {
    /// Cost spent so far.
    pub spent: f64,
    /// The configured ceiling.
    pub ceiling: f64,
}

/// Classification of a terminal stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The generation port never produced a response within the ceiling.
    TransportFailure,
    /// Responses arrived but none parsed as structured output.
    MalformedOutput,
    /// A parseable artifact never passed validation within the revision
    /// ceiling.
    ValidationFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransportFailure => write!(f, "transport_failure"),
            Self::MalformedOutput => write!(f, "malformed_output"),
            Self::ValidationFailure => write!(f, "validation_failure"),
        }
    }
}

/// Structured report for a stage that exhausted its ceilings.
///
/// Carried on the run result rather than raised, so callers always receive
/// the reason list alongside whatever artifacts the run did produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFailureReport {
    /// The failed stage.
    pub stage: StageName,
    /// What class of failure exhausted the stage.
    pub kind: FailureKind,
    /// Human-readable reasons, most specific first.
    pub reasons: Vec<String>,
}

impl StageFailureReport {
    /// Creates a new stage failure report.
    #[must_use]
    pub fn new(stage: StageName, kind: FailureKind, reasons: Vec<String>) -> Self {
        Self {
            stage,
            kind,
            reasons,
        }
    }
}

impl std::fmt::Display for StageFailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' failed ({}): {}",
            self.stage,
            self.kind,
            self.reasons.join("; ")
        )
    }
}
