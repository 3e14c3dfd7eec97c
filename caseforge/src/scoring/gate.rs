//! Release gate: the final pass/fail decision.
//!
//! The gate aggregates mandatory phase scores and enforces hard conditions
//! that no score can buy back: clean encoding, identity continuity, a
//! falsifiable discriminating test, and explicit resolution for every
//! suspect. The blocking-reason report is deterministic so callers can
//! re-run specific stages rather than the whole pipeline.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::core::{Artifact, ArtifactKind};
use crate::scoring::PhaseScore;
use crate::stages::StageName;
use crate::validation::{check_semantics, ValidationContext};

/// The gate's decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    /// True when publication is allowed.
    pub pass: bool,
    /// Every blocking reason, in deterministic order.
    pub blocking_reasons: Vec<String>,
}

impl GateResult {
    /// Builds a result from a reason list.
    #[must_use]
    pub fn from_reasons(blocking_reasons: Vec<String>) -> Self {
        Self {
            pass: blocking_reasons.is_empty(),
            blocking_reasons,
        }
    }
}

/// Evaluates phase scores and hard conditions for a completed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseGate;

impl ReleaseGate {
    /// Creates a gate.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs the gate over the run's scores and final artifacts.
    ///
    /// `mandatory` names the stages whose phase scores must pass.
    #[must_use]
    pub fn evaluate(
        &self,
        scores: &[PhaseScore],
        artifacts: &[Artifact],
        ctx: &ValidationContext,
        mandatory: &HashSet<StageName>,
    ) -> GateResult {
        let mut reasons = Vec::new();

        // Mandatory phases must clear their scores.
        for score in scores {
            if mandatory.contains(&score.stage) && !score.passed {
                reasons.push(format!(
                    "phase '{}' failed its score gate: composite {:.1}, quality {:.1}, consistency {:.1}, validation {:.1}, completeness {:.1}",
                    score.stage,
                    score.composite_score,
                    score.quality_score,
                    score.consistency_score,
                    score.validation_score,
                    score.completeness_score,
                ));
            }
        }

        // Hard condition: no unresolved encoding corruption markers.
        for artifact in artifacts {
            if content_has_corruption(&artifact.content) {
                reasons.push(format!(
                    "encoding corruption marker found in '{}' artifact",
                    artifact.stage
                ));
            }
        }

        // Hard condition: no identity-continuity break in the prose.
        if let Some(prose) = artifacts.iter().find(|a| a.kind == ArtifactKind::Prose) {
            let (violations, _) = check_semantics(ArtifactKind::Prose, &prose.content, ctx);
            for violation in violations {
                if violation.message.contains("identity continuity break") {
                    reasons.push(violation.message);
                }
            }
        }

        // Hard condition: a falsifiable discriminating test narrows the
        // field to exactly one candidate.
        if let Some(case_model) = artifacts.iter().find(|a| a.kind == ArtifactKind::CaseModel) {
            if let Some(reason) = check_discriminating_test(&case_model.content, ctx) {
                reasons.push(reason);
            }
            // Hard condition: every suspect is cleared or implicated.
            for reason in check_suspect_resolution(&case_model.content, ctx) {
                reasons.push(reason);
            }
        }

        GateResult::from_reasons(reasons)
    }
}

/// Mojibake and replacement-character patterns that mark a broken encoding
/// round trip.
fn corruption_regex() -> Regex {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\x{FFFD}|â€|Ã[\x{80}-\x{FF}]").unwrap()
}

fn content_has_corruption(content: &Value) -> bool {
    let re = corruption_regex();
    has_corrupt_string(content, &re)
}

fn has_corrupt_string(value: &Value, re: &Regex) -> bool {
    match value {
        Value::String(s) => re.is_match(s),
        Value::Array(items) => items.iter().any(|v| has_corrupt_string(v, re)),
        Value::Object(map) => map.values().any(|v| has_corrupt_string(v, re)),
        _ => false,
    }
}

fn check_discriminating_test(case_model: &Value, ctx: &ValidationContext) -> Option<String> {
    let description = case_model
        .get("discriminating_test")
        .and_then(|t| t.get("description"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if description.trim().is_empty() {
        return Some("no falsifiable discriminating test is present".to_string());
    }

    let culprit = ctx.culprit().unwrap_or_default();
    let suspects: HashSet<String> = ctx.names_with_role("suspect").into_iter().collect();
    let excludes: HashSet<String> = case_model
        .get("discriminating_test")
        .and_then(|t| t.get("excludes"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let mut remaining: Vec<&String> = suspects
        .iter()
        .filter(|name| !excludes.contains(*name))
        .collect();
    remaining.sort();

    if remaining.len() != 1 || *remaining[0] != culprit {
        return Some(format!(
            "discriminating test does not exclude all but one candidate; remaining: {}",
            remaining
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    None
}

fn check_suspect_resolution(case_model: &Value, ctx: &ValidationContext) -> Vec<String> {
    let culprit = ctx.culprit().unwrap_or_default();
    let mut resolved: HashSet<String> = HashSet::new();
    resolved.insert(culprit);

    for step in case_model
        .get("deduction_chain")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        for name in step
            .get("excludes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            resolved.insert(name.to_string());
        }
    }
    for name in case_model
        .get("discriminating_test")
        .and_then(|t| t.get("excludes"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
    {
        resolved.insert(name.to_string());
    }

    let mut unresolved: Vec<String> = ctx
        .names_with_role("suspect")
        .into_iter()
        .filter(|name| !resolved.contains(name))
        .collect();
    unresolved.sort();
    unresolved
        .into_iter()
        .map(|name| format!("cast member '{name}' is neither cleared nor implicated"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{DimensionFloors, ScoreWeights};
    use crate::testing::fixtures;

    fn passing_score(stage: StageName) -> PhaseScore {
        PhaseScore::evaluate(
            stage,
            80.0,
            85.0,
            90.0,
            80.0,
            &ScoreWeights::default(),
            &DimensionFloors::default(),
            75.0,
        )
    }

    fn mandatory() -> HashSet<StageName> {
        [StageName::CaseModel, StageName::Prose].into_iter().collect()
    }

    #[test]
    fn test_gate_passes_clean_run() {
        let artifacts = fixtures::valid_artifact_set();
        let ctx = fixtures::context_for_all();
        let scores: Vec<PhaseScore> =
            artifacts.iter().map(|a| passing_score(a.stage)).collect();

        let result = ReleaseGate::new().evaluate(&scores, &artifacts, &ctx, &mandatory());
        assert!(result.pass, "reasons: {:?}", result.blocking_reasons);
        assert!(result.blocking_reasons.is_empty());
    }

    #[test]
    fn test_gate_blocks_failed_mandatory_phase() {
        let artifacts = fixtures::valid_artifact_set();
        let ctx = fixtures::context_for_all();
        let mut scores: Vec<PhaseScore> =
            artifacts.iter().map(|a| passing_score(a.stage)).collect();
        for score in &mut scores {
            if score.stage == StageName::CaseModel {
                *score = PhaseScore::evaluate(
                    StageName::CaseModel,
                    40.0,
                    85.0,
                    90.0,
                    80.0,
                    &ScoreWeights::default(),
                    &DimensionFloors::default(),
                    75.0,
                );
            }
        }

        let result = ReleaseGate::new().evaluate(&scores, &artifacts, &ctx, &mandatory());
        assert!(!result.pass);
        assert!(result.blocking_reasons[0].contains("phase 'case_model'"));
    }

    #[test]
    fn test_gate_blocks_corruption_marker() {
        let mut artifacts = fixtures::valid_artifact_set();
        let ctx = fixtures::context_for_all();
        if let Some(setting) = artifacts
            .iter_mut()
            .find(|a| a.kind == ArtifactKind::Setting)
        {
            setting.content["description"] =
                serde_json::json!("A granite manor above the sea\u{FFFD}");
        }
        let scores: Vec<PhaseScore> =
            artifacts.iter().map(|a| passing_score(a.stage)).collect();

        let result = ReleaseGate::new().evaluate(&scores, &artifacts, &ctx, &mandatory());
        assert!(!result.pass);
        assert!(result.blocking_reasons[0].contains("encoding corruption"));
    }

    #[test]
    fn test_gate_blocks_missing_discriminating_test() {
        let mut artifacts = fixtures::valid_artifact_set();
        let ctx = fixtures::context_for_all();
        if let Some(cm) = artifacts
            .iter_mut()
            .find(|a| a.kind == ArtifactKind::CaseModel)
        {
            cm.content["discriminating_test"]["description"] = serde_json::json!("");
        }
        let scores: Vec<PhaseScore> =
            artifacts.iter().map(|a| passing_score(a.stage)).collect();

        let result = ReleaseGate::new().evaluate(&scores, &artifacts, &ctx, &mandatory());
        assert!(!result.pass);
        assert!(result
            .blocking_reasons
            .iter()
            .any(|r| r.contains("discriminating test")));
    }

    #[test]
    fn test_gate_reports_are_deterministic() {
        let mut artifacts = fixtures::valid_artifact_set();
        let ctx = fixtures::context_for_all();
        if let Some(cm) = artifacts
            .iter_mut()
            .find(|a| a.kind == ArtifactKind::CaseModel)
        {
            cm.content["discriminating_test"]["excludes"] = serde_json::json!([]);
            cm.content["deduction_chain"] = serde_json::json!([]);
        }
        let scores: Vec<PhaseScore> =
            artifacts.iter().map(|a| passing_score(a.stage)).collect();

        let gate = ReleaseGate::new();
        let first = gate.evaluate(&scores, &artifacts, &ctx, &mandatory());
        let second = gate.evaluate(&scores, &artifacts, &ctx, &mandatory());
        assert_eq!(first.blocking_reasons, second.blocking_reasons);
        assert!(!first.pass);
    }
}
