//! Pluggable score dimensions.
//!
//! Each dimension maps an artifact (plus its upstream context) to a 0-100
//! figure. The heuristics are deliberately swappable: the orchestrator and
//! the gate only see the trait.

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use crate::core::{Artifact, ArtifactKind};
use crate::validation::{validate, ValidationContext};

/// A single scoring heuristic.
pub trait ScoreDimension: Send + Sync {
    /// The dimension name.
    fn name(&self) -> &'static str;

    /// Scores an artifact in `[0.0, 100.0]`.
    fn score(&self, artifact: &Artifact, ctx: &ValidationContext) -> f64;
}

fn collect_string_leaves<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => {
            for item in items {
                collect_string_leaves(item, out);
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                collect_string_leaves(child, out);
            }
        }
        _ => {}
    }
}

/// Content richness and specificity heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl ScoreDimension for QualityScorer {
    fn name(&self) -> &'static str {
        "quality"
    }

    fn score(&self, artifact: &Artifact, _ctx: &ValidationContext) -> f64 {
        let mut leaves = Vec::new();
        collect_string_leaves(&artifact.content, &mut leaves);
        let populated: Vec<&str> = leaves
            .iter()
            .copied()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if populated.is_empty() {
            return 0.0;
        }

        let words: Vec<&str> = populated
            .iter()
            .flat_map(|s| s.split_whitespace())
            .collect();
        if words.is_empty() {
            return 0.0;
        }

        let presence = (populated.len() as f64 / 8.0).min(1.0);
        let avg_words = words.len() as f64 / populated.len() as f64;
        let length = (avg_words / 12.0).min(1.0);
        let distinct: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let diversity = distinct.len() as f64 / words.len() as f64;

        100.0 * (0.4 * presence + 0.3 * length + 0.3 * diversity)
    }
}

/// Cross-artifact agreement: how many of the artifact's references resolve
/// against the canonical cast and clue lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyScorer;

impl ConsistencyScorer {
    fn references(artifact: &Artifact, ctx: &ValidationContext) -> (usize, usize) {
        let cast: HashSet<String> = ctx.cast_names().into_iter().collect();
        let clue_ids: HashSet<String> = ctx.clue_ids().into_iter().collect();
        let content = &artifact.content;
        let mut total = 0usize;
        let mut resolved = 0usize;

        let mut tally = |name: &str, universe: &HashSet<String>| {
            total += 1;
            if universe.contains(name) {
                resolved += 1;
            }
        };

        match artifact.kind {
            ArtifactKind::CaseModel => {
                if let Some(culprit) = content.get("culprit").and_then(Value::as_str) {
                    tally(culprit, &cast);
                }
                for herring in list(content, "red_herrings") {
                    if let Some(target) = herring.get("points_to").and_then(Value::as_str) {
                        tally(target, &cast);
                    }
                }
            }
            ArtifactKind::CharacterProfiles => {
                for profile in list(content, "profiles") {
                    if let Some(name) = profile.get("name").and_then(Value::as_str) {
                        tally(name, &cast);
                    }
                }
            }
            ArtifactKind::Clues => {
                for clue in list(content, "clues") {
                    for key in ["discovered_by", "implicates"] {
                        if let Some(name) = clue.get(key).and_then(Value::as_str) {
                            tally(name, &cast);
                        }
                    }
                }
            }
            ArtifactKind::Outline => {
                for act in list(content, "acts") {
                    for scene in act.get("scenes").and_then(Value::as_array).into_iter().flatten() {
                        for name in scene
                            .get("characters")
                            .and_then(Value::as_array)
                            .into_iter()
                            .flatten()
                            .filter_map(Value::as_str)
                        {
                            tally(name, &cast);
                        }
                        for id in scene
                            .get("clue_refs")
                            .and_then(Value::as_array)
                            .into_iter()
                            .flatten()
                            .filter_map(Value::as_str)
                        {
                            tally(id, &clue_ids);
                        }
                    }
                }
            }
            ArtifactKind::Prose => {
                let mut text = String::new();
                let mut leaves = Vec::new();
                collect_string_leaves(content, &mut leaves);
                for leaf in leaves {
                    text.push_str(leaf);
                    text.push('\n');
                }
                let mentioned: HashSet<String> = cast
                    .iter()
                    .filter(|name| {
                        let pattern = format!(r"\b{}\b", regex::escape(name));
                        Regex::new(&pattern).is_ok_and(|re| re.is_match(&text))
                    })
                    .cloned()
                    .collect();
                for name in &cast {
                    tally(name, &mentioned);
                }
            }
            _ => {}
        }

        (resolved, total)
    }
}

fn list<'a>(content: &'a Value, key: &str) -> Vec<&'a Value> {
    content
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

impl ScoreDimension for ConsistencyScorer {
    fn name(&self) -> &'static str {
        "consistency"
    }

    fn score(&self, artifact: &Artifact, ctx: &ValidationContext) -> f64 {
        let (resolved, total) = Self::references(artifact, ctx);
        if total == 0 {
            return 100.0;
        }
        100.0 * resolved as f64 / total as f64
    }
}

/// Fraction of schema and semantic checks passed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationScorer;

impl ScoreDimension for ValidationScorer {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn score(&self, artifact: &Artifact, ctx: &ValidationContext) -> f64 {
        let report = validate(artifact.kind, &artifact.content, ctx);
        100.0 * report.pass_fraction()
    }
}

/// Presence and volume of required narrative fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessScorer;

impl CompletenessScorer {
    fn expected_chars(kind: ArtifactKind) -> f64 {
        match kind {
            ArtifactKind::Prose => 2000.0,
            ArtifactKind::Outline => 600.0,
            _ => 200.0,
        }
    }
}

impl ScoreDimension for CompletenessScorer {
    fn name(&self) -> &'static str {
        "completeness"
    }

    fn score(&self, artifact: &Artifact, ctx: &ValidationContext) -> f64 {
        let report = validate(artifact.kind, &artifact.content, ctx);
        let presence = report.pass_fraction();

        let mut leaves = Vec::new();
        collect_string_leaves(&artifact.content, &mut leaves);
        let chars: usize = leaves.iter().map(|s| s.len()).sum();
        let volume = (chars as f64 / Self::expected_chars(artifact.kind)).min(1.0);

        100.0 * (0.7 * presence + 0.3 * volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StageName;
    use serde_json::json;

    fn setting_artifact() -> Artifact {
        Artifact::new(
            StageName::Setting,
            json!({
                "era": "the autumn of 1923",
                "region": "the Cornish coast",
                "locale": "Trewithen Hall, a granite manor",
                "description": "Storm lanterns, servant passages, and a private cove below the cliff walk."
            }),
        )
    }

    #[test]
    fn test_quality_rewards_populated_content() {
        let rich = QualityScorer.score(&setting_artifact(), &ValidationContext::new());
        let empty = QualityScorer.score(
            &Artifact::new(StageName::Setting, json!({"era": "", "region": ""})),
            &ValidationContext::new(),
        );
        assert!(rich > 50.0, "rich scored {rich}");
        assert!(empty < 1.0, "empty scored {empty}");
    }

    #[test]
    fn test_consistency_perfect_when_no_references() {
        let score = ConsistencyScorer.score(&setting_artifact(), &ValidationContext::new());
        assert!((score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_consistency_counts_unresolved_references() {
        let ctx = ValidationContext::new().with_artifact(
            ArtifactKind::Cast,
            json!({"members": [
                {"name": "Margaret Voss", "role": "detective", "motive": "m", "alibi": "a"},
                {"name": "Edmund Carrow", "role": "suspect", "motive": "m", "alibi": "a"}
            ]}),
        );
        let clues = Artifact::new(
            StageName::Clues,
            json!({"clues": [
                {"id": "c1", "description": "d", "location": "l", "discovered_by": "Margaret Voss", "implicates": "Edmund Carrow", "veracity": "genuine"},
                {"id": "c2", "description": "d", "location": "l", "discovered_by": "Nobody", "implicates": "Edmund Carrow", "veracity": "genuine"}
            ]}),
        );
        let score = ConsistencyScorer.score(&clues, &ctx);
        assert!((score - 75.0).abs() < 1e-9, "scored {score}");
    }

    #[test]
    fn test_validation_dimension_reflects_errors() {
        let ctx = ValidationContext::new();
        let valid = ValidationScorer.score(&setting_artifact(), &ctx);
        assert!((valid - 100.0).abs() < f64::EPSILON);

        let broken = Artifact::new(StageName::Setting, json!({"era": "1923"}));
        let score = ValidationScorer.score(&broken, &ctx);
        assert!(score < 50.0, "scored {score}");
    }

    #[test]
    fn test_completeness_rewards_volume() {
        let ctx = ValidationContext::new();
        let full = CompletenessScorer.score(&setting_artifact(), &ctx);
        let thin = CompletenessScorer.score(
            &Artifact::new(
                StageName::Setting,
                json!({"era": "a", "region": "b", "locale": "c", "description": "d"}),
            ),
            &ctx,
        );
        assert!(full > thin);
        assert!(thin >= 60.0, "presence alone keeps completeness above its floor, got {thin}");
    }
}
