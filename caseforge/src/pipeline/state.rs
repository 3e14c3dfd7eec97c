//! Per-stage execution state machine.
//!
//! Each stage runs `Generating -> Validating -> (Complete | Revising) ->
//! Complete`, with attempt counters as first-class fields rather than loop
//! locals, so they survive suspension and show up in events.

use serde::{Deserialize, Serialize};

use crate::core::StageDisposition;
use crate::stages::{StageName, StageSpec};

/// The phase a stage execution is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePhase {
    /// Calling the generation port and parsing candidates.
    Generating,
    /// Running the validation engine on a parsed candidate.
    Validating,
    /// Driving the revision engine over an invalid artifact.
    Revising,
    /// Terminal.
    Complete(StageDisposition),
}

/// Mutable execution state for one stage of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageExecution {
    /// The stage.
    pub stage: StageName,
    /// Current phase.
    pub phase: StagePhase,
    /// Generation attempts consumed (parse retries).
    pub generation_attempts: usize,
    /// Revision attempts consumed.
    pub revision_attempts: usize,
    /// Highest artifact version produced so far.
    pub latest_version: u32,
}

impl StageExecution {
    /// Creates fresh state in `Generating`.
    #[must_use]
    pub fn new(stage: StageName) -> Self {
        Self {
            stage,
            phase: StagePhase::Generating,
            generation_attempts: 0,
            revision_attempts: 0,
            latest_version: 0,
        }
    }

    /// Consumes one generation attempt. Returns false when the stage's
    /// ceiling is already spent.
    pub fn try_consume_generation_attempt(&mut self, spec: &StageSpec) -> bool {
        if self.generation_attempts >= spec.max_generation_attempts {
            return false;
        }
        self.generation_attempts += 1;
        true
    }

    /// Moves to `Validating` after a candidate parses.
    pub fn begin_validation(&mut self) {
        self.phase = StagePhase::Validating;
    }

    /// Moves back to `Generating` after a parse failure.
    pub fn begin_generation(&mut self) {
        self.phase = StagePhase::Generating;
    }

    /// Moves to `Revising` after a validation failure.
    pub fn begin_revision(&mut self) {
        self.phase = StagePhase::Revising;
    }

    /// Terminates the stage.
    pub fn complete(&mut self, disposition: StageDisposition) {
        self.phase = StagePhase::Complete(disposition);
    }

    /// Returns the terminal disposition, if the stage finished.
    #[must_use]
    pub fn disposition(&self) -> Option<StageDisposition> {
        match self.phase {
            StagePhase::Complete(disposition) => Some(disposition),
            _ => None,
        }
    }

    /// Returns true once the stage is terminal.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.phase, StagePhase::Complete(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> StageSpec {
        StageSpec::new(StageName::Setting, vec![]).with_max_generation_attempts(2)
    }

    #[test]
    fn test_new_execution_starts_generating() {
        let exec = StageExecution::new(StageName::Setting);
        assert_eq!(exec.phase, StagePhase::Generating);
        assert_eq!(exec.generation_attempts, 0);
        assert!(!exec.is_complete());
    }

    #[test]
    fn test_generation_attempts_bounded() {
        let spec = spec();
        let mut exec = StageExecution::new(StageName::Setting);
        assert!(exec.try_consume_generation_attempt(&spec));
        assert!(exec.try_consume_generation_attempt(&spec));
        assert!(!exec.try_consume_generation_attempt(&spec));
        assert_eq!(exec.generation_attempts, 2);
    }

    #[test]
    fn test_phase_transitions() {
        let mut exec = StageExecution::new(StageName::Cast);
        exec.begin_validation();
        assert_eq!(exec.phase, StagePhase::Validating);
        exec.begin_revision();
        assert_eq!(exec.phase, StagePhase::Revising);
        exec.complete(StageDisposition::Valid);
        assert!(exec.is_complete());
        assert_eq!(exec.disposition(), Some(StageDisposition::Valid));
    }

    #[test]
    fn test_counters_survive_transitions() {
        let spec = spec();
        let mut exec = StageExecution::new(StageName::Cast);
        assert!(exec.try_consume_generation_attempt(&spec));
        exec.begin_validation();
        exec.begin_generation();
        assert_eq!(exec.generation_attempts, 1);
    }
}
