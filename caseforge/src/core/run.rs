//! Run lifecycle records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::errors::StageFailureReport;
use crate::scoring::{GateResult, PhaseScore};
use crate::stages::StageName;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created but not started.
    #[default]
    Pending,
    /// Stages are executing.
    Running,
    /// Every stage resolved and the release gate passed.
    Succeeded,
    /// A mandatory stage failed or the gate blocked publication.
    Failed,
    /// Cancelled before completion.
    Aborted,
}

impl RunState {
    /// Returns true for terminal states.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Token and cost figures returned by the generation port for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the request context.
    pub input_tokens: u64,
    /// Tokens produced in the response.
    pub output_tokens: u64,
    /// Monetary cost of the call.
    pub cost: f64,
}

impl Usage {
    /// Creates a usage figure.
    #[must_use]
    pub fn new(input_tokens: u64, output_tokens: u64, cost: f64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cost,
        }
    }

    /// Total tokens across input and output.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulates another usage figure into this one.
    pub fn merge(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost += other.cost;
    }
}

/// Accumulated usage for one stage of a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageUsage {
    /// Number of generation calls, including repairs.
    pub calls: u64,
    /// Summed usage figures.
    pub usage: Usage,
    /// Wall time spent in the stage, milliseconds.
    pub duration_ms: u64,
}

/// Per-stage and aggregate usage accounting for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Usage keyed by stage name.
    pub stages: HashMap<String, StageUsage>,
}

impl UsageTotals {
    /// Creates empty totals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one call's usage under a stage.
    pub fn record(&mut self, stage: StageName, usage: Usage) {
        let entry = self.stages.entry(stage.as_str().to_string()).or_default();
        entry.calls += 1;
        entry.usage.merge(usage);
    }

    /// Adds an aggregated usage figure and call count under a stage.
    pub fn add(&mut self, stage: StageName, usage: Usage, calls: u64) {
        let entry = self.stages.entry(stage.as_str().to_string()).or_default();
        entry.calls += calls;
        entry.usage.merge(usage);
    }

    /// Records wall time for a stage.
    pub fn record_duration(&mut self, stage: StageName, duration_ms: u64) {
        let entry = self.stages.entry(stage.as_str().to_string()).or_default();
        entry.duration_ms += duration_ms;
    }

    /// Total cost across all stages.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.stages.values().map(|s| s.usage.cost).sum()
    }

    /// Total tokens across all stages.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.stages.values().map(|s| s.usage.total_tokens()).sum()
    }

    /// Total generation calls across all stages.
    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.stages.values().map(|s| s.calls).sum()
    }
}

/// Terminal disposition of one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageDisposition {
    /// The stage produced a valid artifact.
    Valid,
    /// A soft-failable stage kept its best invalid artifact.
    Degraded,
    /// The stage exhausted its ceilings.
    Failed,
}

impl fmt::Display for StageDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of one stage's resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The stage.
    pub stage: StageName,
    /// How the stage resolved.
    pub disposition: StageDisposition,
    /// Version number of the current artifact.
    pub version: u32,
    /// Residual error count (zero for valid artifacts).
    pub error_count: usize,
}

/// One end-to-end execution, owner of all artifacts and events it produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique run id.
    pub id: Uuid,
    /// The owning project.
    pub project_id: String,
    /// Lifecycle state.
    pub state: RunState,
    /// The stage currently executing, if any.
    pub current_stage: Option<StageName>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Completion timestamp, set on terminal transition.
    pub completed_at: Option<String>,
    /// Ordered warnings accumulated during execution.
    pub warnings: Vec<String>,
    /// Usage accounting.
    pub usage: UsageTotals,
}

impl Run {
    /// Creates a pending run for a project.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), project_id)
    }

    /// Creates a pending run with a caller-supplied id.
    #[must_use]
    pub fn with_id(id: Uuid, project_id: impl Into<String>) -> Self {
        Self {
            id,
            project_id: project_id.into(),
            state: RunState::Pending,
            current_stage: None,
            created_at: crate::utils::iso_timestamp(),
            completed_at: None,
            warnings: Vec::new(),
            usage: UsageTotals::new(),
        }
    }

    /// Transitions the run to a terminal state and stamps completion.
    pub fn complete(&mut self, state: RunState) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.current_stage = None;
        self.completed_at = Some(crate::utils::iso_timestamp());
    }

    /// Appends a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Externally readable snapshot of a run's progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatus {
    /// Lifecycle state.
    pub state: RunState,
    /// The stage currently executing, if any.
    pub current_stage: Option<StageName>,
    /// Phase scores, populated once scoring has run.
    pub scores: Vec<PhaseScore>,
    /// Gate decision, populated once the gate has run.
    pub gate: Option<GateResult>,
}

/// The result of a completed pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// The run id.
    pub run_id: Uuid,
    /// Terminal state.
    pub state: RunState,
    /// Per-stage resolutions, in stage order.
    pub stages: Vec<StageOutcome>,
    /// Phase scores, computed once all stages resolved.
    pub scores: Vec<PhaseScore>,
    /// Release gate decision, when scoring ran.
    pub gate: Option<GateResult>,
    /// The failure that ended the run early, if any.
    pub failure: Option<StageFailureReport>,
    /// Ordered warnings.
    pub warnings: Vec<String>,
    /// Usage accounting.
    pub usage: UsageTotals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_terminal() {
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Aborted.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::Pending.is_terminal());
    }

    #[test]
    fn test_usage_merge() {
        let mut a = Usage::new(100, 50, 0.01);
        a.merge(Usage::new(10, 5, 0.002));
        assert_eq!(a.input_tokens, 110);
        assert_eq!(a.output_tokens, 55);
        assert!((a.cost - 0.012).abs() < 1e-9);
        assert_eq!(a.total_tokens(), 165);
    }

    #[test]
    fn test_usage_totals_record() {
        let mut totals = UsageTotals::new();
        totals.record(StageName::Setting, Usage::new(100, 200, 0.01));
        totals.record(StageName::Setting, Usage::new(50, 50, 0.005));
        totals.record(StageName::Prose, Usage::new(1000, 2000, 0.1));

        assert_eq!(totals.total_calls(), 3);
        assert_eq!(totals.total_tokens(), 3400);
        assert!((totals.total_cost() - 0.115).abs() < 1e-9);

        let setting = &totals.stages["setting"];
        assert_eq!(setting.calls, 2);
        assert_eq!(setting.usage.total_tokens(), 400);
    }

    #[test]
    fn test_run_complete_stamps_time() {
        let mut run = Run::new("project-1");
        assert_eq!(run.state, RunState::Pending);
        assert!(run.completed_at.is_none());

        run.state = RunState::Running;
        run.current_stage = Some(StageName::Setting);
        run.complete(RunState::Succeeded);

        assert_eq!(run.state, RunState::Succeeded);
        assert!(run.current_stage.is_none());
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn test_run_warnings_ordered() {
        let mut run = Run::new("p");
        run.warn("first");
        run.warn("second");
        assert_eq!(run.warnings, vec!["first", "second"]);
    }
}
