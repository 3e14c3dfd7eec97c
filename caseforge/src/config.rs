//! Pipeline configuration.

use std::time::Duration;

use crate::errors::CaseforgeError;
use crate::generation::RetryPolicy;
use crate::scoring::{DimensionFloors, ScoreWeights};
use crate::stages::{default_stages, validate_order, StageSpec};

/// Tunables for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The stage order to execute.
    pub stages: Vec<StageSpec>,
    /// Retry and cool-down policy for generation calls.
    pub retry: RetryPolicy,
    /// Per-call deadline for generation and repair requests.
    pub generation_timeout: Duration,
    /// Composite score weights.
    pub weights: ScoreWeights,
    /// Per-dimension score floors.
    pub floors: DimensionFloors,
    /// Composite threshold a phase must reach.
    pub composite_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            retry: RetryPolicy::default(),
            generation_timeout: Duration::from_secs(120),
            weights: ScoreWeights::default(),
            floors: DimensionFloors::default(),
            composite_threshold: 75.0,
        }
    }
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stage order.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<StageSpec>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-call generation deadline.
    #[must_use]
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Sets the composite weights.
    #[must_use]
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Sets the dimension floors.
    #[must_use]
    pub fn with_floors(mut self, floors: DimensionFloors) -> Self {
        self.floors = floors;
        self
    }

    /// Sets the composite threshold.
    #[must_use]
    pub fn with_composite_threshold(mut self, threshold: f64) -> Self {
        self.composite_threshold = threshold;
        self
    }

    /// Validates the stage order.
    ///
    /// # Errors
    ///
    /// Returns [`CaseforgeError::Config`] when the configuration is empty
    /// or a dependency is missing or declared out of order.
    pub fn validate(&self) -> Result<(), CaseforgeError> {
        if self.stages.is_empty() {
            return Err(CaseforgeError::Config("no stages configured".to_string()));
        }
        validate_order(&self.stages).map_err(CaseforgeError::Config)
    }
}
