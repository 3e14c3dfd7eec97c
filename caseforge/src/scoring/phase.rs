//! Phase scores: composite weighting over the four dimensions.
//!
//! The weights are a tunable, monotonic combination; the floors and the
//! composite threshold are contractual. A high composite can never mask a
//! dimension below its floor.

use serde::{Deserialize, Serialize};

use crate::stages::StageName;

/// Weights combining the four dimensions into a composite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Content richness weight.
    pub quality: f64,
    /// Cross-artifact agreement weight.
    pub consistency: f64,
    /// Checks-passed weight.
    pub validation: f64,
    /// Required-field presence/volume weight.
    pub completeness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            quality: 0.30,
            consistency: 0.25,
            validation: 0.25,
            completeness: 0.20,
        }
    }
}

impl ScoreWeights {
    /// Weighted mean of the four dimension scores, normalized by the
    /// weight sum.
    #[must_use]
    pub fn composite(&self, quality: f64, consistency: f64, validation: f64, completeness: f64) -> f64 {
        let sum = self.quality + self.consistency + self.validation + self.completeness;
        if sum <= 0.0 {
            return 0.0;
        }
        (self.quality * quality
            + self.consistency * consistency
            + self.validation * validation
            + self.completeness * completeness)
            / sum
    }
}

/// Per-dimension minimums a phase must clear regardless of composite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DimensionFloors {
    /// Quality floor.
    pub quality: f64,
    /// Consistency floor.
    pub consistency: f64,
    /// Validation floor.
    pub validation: f64,
    /// Completeness floor.
    pub completeness: f64,
}

impl Default for DimensionFloors {
    fn default() -> Self {
        Self {
            quality: 50.0,
            consistency: 50.0,
            validation: 60.0,
            completeness: 60.0,
        }
    }
}

/// Composite score for one phase of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseScore {
    /// The scored stage.
    pub stage: StageName,
    /// Content richness, 0-100.
    pub quality_score: f64,
    /// Cross-artifact agreement, 0-100.
    pub consistency_score: f64,
    /// Fraction of checks passed, 0-100.
    pub validation_score: f64,
    /// Required-field presence and volume, 0-100.
    pub completeness_score: f64,
    /// Weighted composite, 0-100.
    pub composite_score: f64,
    /// True only if the composite clears the threshold and every dimension
    /// clears its floor.
    pub passed: bool,
}

impl PhaseScore {
    /// Evaluates a phase from its four dimension scores.
    #[must_use]
    pub fn evaluate(
        stage: StageName,
        quality: f64,
        consistency: f64,
        validation: f64,
        completeness: f64,
        weights: &ScoreWeights,
        floors: &DimensionFloors,
        threshold: f64,
    ) -> Self {
        let composite = weights.composite(quality, consistency, validation, completeness);
        let passed = composite >= threshold
            && quality >= floors.quality
            && consistency >= floors.consistency
            && validation >= floors.validation
            && completeness >= floors.completeness;
        Self {
            stage,
            quality_score: quality,
            consistency_score: consistency,
            validation_score: validation,
            completeness_score: completeness,
            composite_score: composite,
            passed,
        }
    }
}
