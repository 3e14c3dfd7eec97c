//! Scoring and the release gate.

mod dimensions;
mod gate;
mod phase;

pub use dimensions::{
    CompletenessScorer, ConsistencyScorer, QualityScorer, ScoreDimension, ValidationScorer,
};
pub use gate::{GateResult, ReleaseGate};
pub use phase::{DimensionFloors, PhaseScore, ScoreWeights};

use crate::core::Artifact;
use crate::validation::ValidationContext;

/// Computes phase scores for a run's artifacts.
///
/// Dimension heuristics sit behind [`ScoreDimension`] so they can be
/// swapped or tuned without touching the orchestrator or the gate.
pub struct Scorer {
    weights: ScoreWeights,
    floors: DimensionFloors,
    threshold: f64,
    quality: Box<dyn ScoreDimension>,
    consistency: Box<dyn ScoreDimension>,
    validation: Box<dyn ScoreDimension>,
    completeness: Box<dyn ScoreDimension>,
}

impl Scorer {
    /// Creates a scorer with the default heuristics.
    #[must_use]
    pub fn new(weights: ScoreWeights, floors: DimensionFloors, threshold: f64) -> Self {
        Self {
            weights,
            floors,
            threshold,
            quality: Box::new(QualityScorer),
            consistency: Box::new(ConsistencyScorer),
            validation: Box::new(ValidationScorer),
            completeness: Box::new(CompletenessScorer),
        }
    }

    /// Replaces the quality heuristic.
    #[must_use]
    pub fn with_quality(mut self, dimension: Box<dyn ScoreDimension>) -> Self {
        self.quality = dimension;
        self
    }

    /// Replaces the consistency heuristic.
    #[must_use]
    pub fn with_consistency(mut self, dimension: Box<dyn ScoreDimension>) -> Self {
        self.consistency = dimension;
        self
    }

    /// Replaces the validation heuristic.
    #[must_use]
    pub fn with_validation(mut self, dimension: Box<dyn ScoreDimension>) -> Self {
        self.validation = dimension;
        self
    }

    /// Replaces the completeness heuristic.
    #[must_use]
    pub fn with_completeness(mut self, dimension: Box<dyn ScoreDimension>) -> Self {
        self.completeness = dimension;
        self
    }

    /// Scores one artifact.
    #[must_use]
    pub fn score_artifact(&self, artifact: &Artifact, ctx: &ValidationContext) -> PhaseScore {
        PhaseScore::evaluate(
            artifact.stage,
            self.quality.score(artifact, ctx),
            self.consistency.score(artifact, ctx),
            self.validation.score(artifact, ctx),
            self.completeness.score(artifact, ctx),
            &self.weights,
            &self.floors,
            self.threshold,
        )
    }

    /// Scores every artifact of a completed run, in the given order.
    #[must_use]
    pub fn score_run(&self, artifacts: &[Artifact], ctx: &ValidationContext) -> Vec<PhaseScore> {
        artifacts
            .iter()
            .map(|artifact| self.score_artifact(artifact, ctx))
            .collect()
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default(), DimensionFloors::default(), 75.0)
    }
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scorer")
            .field("weights", &self.weights)
            .field("floors", &self.floors)
            .field("threshold", &self.threshold)
            .finish()
    }
}
