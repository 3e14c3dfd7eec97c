//! Revision engine: bounded, targeted repair of invalid artifacts.
//!
//! Each attempt builds a minimal repair request from the current error set,
//! regenerates, re-validates, and classifies the outcome. Attempts that do
//! not improve the artifact escalate the next request instead of repeating
//! it. The engine never exceeds the stage's revision ceiling.

pub mod request;

pub use request::{
    build_repair_request, categorize, frozen_paths, group_by_container, guardrails_for,
    ErrorBuckets,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::core::{Artifact, Usage};
use crate::errors::CaseforgeError;
use crate::generation::{call_with_retry, GenerationPort, GenerationRequest, RetryPolicy, UsageMeter};
use crate::pipeline::CancellationToken;
use crate::stages::StageSpec;
use crate::utils::fingerprint;
use crate::validation::{validate, ValidationContext, ValidationError};

/// Outcome of one revision attempt, or of the whole revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionOutcome {
    /// Re-validation found zero errors and no frozen-path drift.
    Fixed,
    /// The error count strictly decreased.
    PartiallyFixed,
    /// The error count did not improve.
    Unchanged,
    /// The response did not parse as structured output.
    MalformedOutput,
    /// The ceiling was exhausted without reaching valid.
    Failed,
}

impl fmt::Display for RevisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::PartiallyFixed => write!(f, "partially_fixed"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::MalformedOutput => write!(f, "malformed_output"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Record of one repair attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionAttempt {
    /// 1-based attempt number.
    pub attempt_number: usize,
    /// The errors the repair request targeted.
    pub errors_addressed: Vec<ValidationError>,
    /// The artifact version the attempt resulted in. A malformed response
    /// produces no new version and reports the prior one.
    pub resulting_version: u32,
    /// How the attempt resolved.
    pub outcome: RevisionOutcome,
}

/// The result of driving repairs for one invalid artifact.
#[derive(Debug, Clone)]
pub struct RevisionResult {
    /// The final artifact: valid on `Fixed`, best-so-far on `Failed`.
    pub artifact: Artifact,
    /// `Fixed` or `Failed`.
    pub outcome: RevisionOutcome,
    /// The chained attempt records, at most the stage ceiling.
    pub attempts: Vec<RevisionAttempt>,
    /// Every parsed candidate version, for audit persistence.
    pub versions: Vec<Artifact>,
    /// Summed usage across repair calls.
    pub usage: Usage,
}

/// Drives bounded repair attempts against the generation port.
pub struct RevisionEngine<'a> {
    port: &'a dyn GenerationPort,
    meter: &'a UsageMeter,
    policy: &'a RetryPolicy,
    cancel: &'a CancellationToken,
    generation_timeout: Duration,
}

impl<'a> RevisionEngine<'a> {
    /// Creates an engine over the given port and retry policy.
    #[must_use]
    pub fn new(
        port: &'a dyn GenerationPort,
        meter: &'a UsageMeter,
        policy: &'a RetryPolicy,
        cancel: &'a CancellationToken,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            port,
            meter,
            policy,
            cancel,
            generation_timeout,
        }
    }

    /// Repairs an invalid artifact within the stage's revision ceiling.
    ///
    /// # Errors
    ///
    /// Returns a [`CaseforgeError`] when the port fails terminally, the
    /// run is cancelled, or the budget is exhausted. Exhausting the
    /// revision ceiling is not an error; it returns outcome `Failed`.
    pub async fn revise(
        &self,
        spec: &StageSpec,
        baseline: Artifact,
        errors: Vec<ValidationError>,
        ctx: &ValidationContext,
    ) -> Result<RevisionResult, CaseforgeError> {
        let ceiling = spec.max_revision_attempts;
        let kind = spec.name.kind();
        let mut attempts: Vec<RevisionAttempt> = Vec::new();
        let mut versions: Vec<Artifact> = Vec::new();
        let mut usage = Usage::default();
        let mut current = baseline;
        let mut current_errors = errors;
        let mut escalation = 0usize;
        let mut latest_version = current.version;

        while attempts.len() < ceiling {
            let attempt_number = attempts.len() + 1;
            let payload = build_repair_request(
                spec.name.intent(),
                &current.content,
                &current_errors,
                escalation,
            );
            let request = GenerationRequest::new(
                spec.name,
                format!("Repair the {} artifact, preserving working content.", spec.name),
                payload,
            )
            .with_timeout(self.generation_timeout);

            tracing::debug!(
                stage = %spec.name,
                attempt = attempt_number,
                errors = current_errors.len(),
                escalation,
                "Issuing repair request"
            );

            let response =
                call_with_retry(self.port, &request, self.policy, self.meter, self.cancel).await?;
            usage.merge(response.usage);

            let Ok(content) = serde_json::from_str::<Value>(&response.content) else {
                attempts.push(RevisionAttempt {
                    attempt_number,
                    errors_addressed: current_errors.clone(),
                    resulting_version: current.version,
                    outcome: RevisionOutcome::MalformedOutput,
                });
                escalation += 1;
                continue;
            };

            latest_version += 1;
            let mut candidate = current.next_version(content);
            candidate.version = latest_version;

            let report = validate(kind, &candidate.content, ctx);
            if report.valid {
                let drift = frozen_path_drift(&current.content, &candidate.content, &current_errors);
                if drift.is_empty() {
                    candidate.mark_valid();
                    versions.push(candidate.clone());
                    attempts.push(RevisionAttempt {
                        attempt_number,
                        errors_addressed: current_errors.clone(),
                        resulting_version: candidate.version,
                        outcome: RevisionOutcome::Fixed,
                    });
                    return Ok(RevisionResult {
                        artifact: candidate,
                        outcome: RevisionOutcome::Fixed,
                        attempts,
                        versions,
                        usage,
                    });
                }

                // Validation passed but the repair touched frozen content;
                // demote and re-report the drifted paths.
                candidate.mark_invalid(drift.clone());
                versions.push(candidate.clone());
                attempts.push(RevisionAttempt {
                    attempt_number,
                    errors_addressed: current_errors.clone(),
                    resulting_version: candidate.version,
                    outcome: RevisionOutcome::PartiallyFixed,
                });
                current = candidate;
                current_errors = drift;
                escalation = 0;
                continue;
            }

            candidate.mark_invalid(report.errors.clone());
            versions.push(candidate.clone());
            if report.errors.len() < current_errors.len() {
                attempts.push(RevisionAttempt {
                    attempt_number,
                    errors_addressed: current_errors.clone(),
                    resulting_version: candidate.version,
                    outcome: RevisionOutcome::PartiallyFixed,
                });
                current = candidate;
                current_errors = report.errors;
                escalation = 0;
            } else {
                // No improvement; keep the prior baseline and widen the
                // next request instead of repeating it.
                attempts.push(RevisionAttempt {
                    attempt_number,
                    errors_addressed: current_errors.clone(),
                    resulting_version: candidate.version,
                    outcome: RevisionOutcome::Unchanged,
                });
                escalation += 1;
            }
        }

        Ok(RevisionResult {
            artifact: current,
            outcome: RevisionOutcome::Failed,
            attempts,
            versions,
            usage,
        })
    }
}

/// Compares frozen top-level containers between baseline and repaired
/// content. Any drift is reported as a violation at the drifted path.
#[must_use]
pub fn frozen_path_drift(
    baseline: &Value,
    repaired: &Value,
    errors: &[ValidationError],
) -> Vec<ValidationError> {
    frozen_paths(baseline, errors)
        .into_iter()
        .filter_map(|path| {
            let before = baseline.get(&path).map(fingerprint);
            let after = repaired.get(&path).map(fingerprint);
            if before == after {
                None
            } else {
                Some(ValidationError::semantic(
                    path.clone(),
                    format!("frozen container '{path}' was modified during repair; restore it"),
                ))
            }
        })
        .collect()
}
