//! Repair request construction.
//!
//! A repair request reproduces the stage's original intent, includes the
//! invalid artifact as a concrete baseline, carries the categorized and
//! location-grouped error summary, and instructs that only broken fields
//! change. Containers with no reported errors are listed as frozen so the
//! post-repair diff check can hold the service to the instruction.

use serde_json::{json, Value};

use crate::validation::{ErrorCategory, ValidationError};

/// Errors partitioned by category, in fix-priority order.
#[derive(Debug, Clone, Default)]
pub struct ErrorBuckets {
    /// Absent or empty required fields.
    pub missing_fields: Vec<ValidationError>,
    /// Shape disagreements.
    pub type_mismatches: Vec<ValidationError>,
    /// Values outside their allowed set.
    pub invalid_enums: Vec<ValidationError>,
    /// Cross-record rule violations.
    pub semantic_violations: Vec<ValidationError>,
}

impl ErrorBuckets {
    /// Total errors across all buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.missing_fields.len()
            + self.type_mismatches.len()
            + self.invalid_enums.len()
            + self.semantic_violations.len()
    }

    /// All errors flattened in category priority order, original order
    /// preserved within a category.
    #[must_use]
    pub fn in_priority_order(&self) -> Vec<&ValidationError> {
        self.missing_fields
            .iter()
            .chain(&self.type_mismatches)
            .chain(&self.invalid_enums)
            .chain(&self.semantic_violations)
            .collect()
    }
}

/// Partitions errors into category buckets. Every input error lands in
/// exactly one bucket.
#[must_use]
pub fn categorize(errors: &[ValidationError]) -> ErrorBuckets {
    let mut buckets = ErrorBuckets::default();
    for error in errors {
        match error.category {
            ErrorCategory::MissingField => buckets.missing_fields.push(error.clone()),
            ErrorCategory::TypeMismatch => buckets.type_mismatches.push(error.clone()),
            ErrorCategory::InvalidEnumValue => buckets.invalid_enums.push(error.clone()),
            ErrorCategory::SemanticViolation => buckets.semantic_violations.push(error.clone()),
        }
    }
    buckets
}

/// Groups errors by their nearest structural container, preserving the
/// first-seen order of containers.
#[must_use]
pub fn group_by_container<'a>(
    errors: &[&'a ValidationError],
) -> Vec<(String, Vec<&'a ValidationError>)> {
    let mut groups: Vec<(String, Vec<&ValidationError>)> = Vec::new();
    for error in errors {
        let container = error.container().to_string();
        match groups.iter_mut().find(|(name, _)| *name == container) {
            Some((_, members)) => members.push(error),
            None => groups.push((container, vec![error])),
        }
    }
    groups
}

fn top_segment(path: &str) -> &str {
    let end = path
        .find(['.', '['])
        .unwrap_or(path.len());
    &path[..end]
}

/// Returns the top-level containers of the baseline that carry no reported
/// errors, sorted for determinism.
#[must_use]
pub fn frozen_paths(baseline: &Value, errors: &[ValidationError]) -> Vec<String> {
    let Some(object) = baseline.as_object() else {
        return Vec::new();
    };
    let mut frozen: Vec<String> = object
        .keys()
        .filter(|key| !errors.iter().any(|e| top_segment(&e.path) == key.as_str()))
        .cloned()
        .collect();
    frozen.sort();
    frozen
}

/// Guardrail instructions escalated in from known coverage gaps.
#[must_use]
pub fn guardrails_for(errors: &[ValidationError]) -> Vec<&'static str> {
    let mut guardrails = Vec::new();
    let mentions = |needle: &str| errors.iter().any(|e| e.message.contains(needle));

    if mentions("discriminating test") || mentions("ruled out") {
        guardrails.push(
            "Include a clear discriminating test scene where multiple plausible suspects are \
             explicitly evaluated and at least one suspect is ruled out using on-page evidence.",
        );
        guardrails.push(
            "Use explicit elimination language such as 'ruled out', 'cannot be the culprit', or \
             'excluded by' the timeline or evidence.",
        );
    }

    if mentions("culprit") || mentions("suspect thread") {
        guardrails.push(
            "Close every major suspect thread with explicit reasoning and evidence-backed \
             elimination.",
        );
        guardrails.push(
            "Provide a complete culprit evidence chain from clue discovery to final proof \
             without relying on off-page information.",
        );
    }

    guardrails
}

/// Builds the structured repair payload sent to the generation port.
///
/// The payload mentions exactly the paths in the error list; untouched
/// containers appear only in `frozen_paths`.
#[must_use]
pub fn build_repair_request(
    intent: &str,
    baseline: &Value,
    errors: &[ValidationError],
    escalation: usize,
) -> Value {
    let buckets = categorize(errors);
    let ordered = buckets.in_priority_order();
    let groups: Vec<Value> = group_by_container(&ordered)
        .into_iter()
        .map(|(container, members)| {
            json!({
                "container": container,
                "errors": members
                    .iter()
                    .map(|e| json!({
                        "category": e.category.as_str(),
                        "path": e.path,
                        "message": e.message,
                    }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let mut instructions = vec![
        "Change only the fields listed in repair_groups.".to_string(),
        "Preserve every field not listed there exactly as it appears in the baseline."
            .to_string(),
        "Return the complete corrected document in the same structure as the baseline."
            .to_string(),
    ];
    if escalation > 0 {
        instructions.push(
            "The previous repair did not improve the artifact. Rework each listed container \
             as a whole, keeping it consistent with the rest of the document."
                .to_string(),
        );
    }
    for guardrail in guardrails_for(errors) {
        instructions.push(guardrail.to_string());
    }

    json!({
        "task": intent,
        "baseline": baseline,
        "repair_groups": groups,
        "frozen_paths": frozen_paths(baseline, errors),
        "instructions": instructions,
        "escalation_level": escalation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_errors() -> Vec<ValidationError> {
        vec![
            ValidationError::semantic("members", "cast has no detective"),
            ValidationError::missing_field("members[0].alibi"),
            ValidationError::invalid_enum("members[1].role", "butler", &["suspect"]),
            ValidationError::missing_field("members[0].motive"),
        ]
    }

    #[test]
    fn test_categorize_is_a_partition() {
        let errors = sample_errors();
        let buckets = categorize(&errors);
        assert_eq!(buckets.total(), errors.len());
        assert_eq!(buckets.missing_fields.len(), 2);
        assert_eq!(buckets.invalid_enums.len(), 1);
        assert_eq!(buckets.semantic_violations.len(), 1);
        assert_eq!(buckets.type_mismatches.len(), 0);

        // Every input error appears exactly once across buckets.
        let flattened = buckets.in_priority_order();
        for error in &errors {
            assert_eq!(flattened.iter().filter(|e| ***e == *error).count(), 1);
        }
    }

    #[test]
    fn test_priority_order_puts_missing_fields_first() {
        let buckets = categorize(&sample_errors());
        let ordered = buckets.in_priority_order();
        assert_eq!(ordered[0].path, "members[0].alibi");
        assert_eq!(ordered[1].path, "members[0].motive");
        assert_eq!(ordered[2].path, "members[1].role");
        assert_eq!(ordered[3].path, "members");
    }

    #[test]
    fn test_group_by_container_gathers_sibling_errors() {
        let buckets = categorize(&sample_errors());
        let ordered = buckets.in_priority_order();
        let groups = group_by_container(&ordered);

        let member0 = groups
            .iter()
            .find(|(name, _)| name == "members[0]")
            .expect("members[0] group");
        assert_eq!(member0.1.len(), 2);
    }

    #[test]
    fn test_frozen_paths_excludes_errored_containers() {
        let baseline = json!({
            "crime": {"kind": "murder"},
            "culprit": "x",
            "deduction_chain": [],
            "red_herrings": []
        });
        let errors = vec![
            ValidationError::missing_field("crime.victim"),
            ValidationError::semantic("deduction_chain", "leaves two candidates"),
        ];
        assert_eq!(
            frozen_paths(&baseline, &errors),
            vec!["culprit".to_string(), "red_herrings".to_string()]
        );
    }

    #[test]
    fn test_repair_request_mentions_exactly_the_error_paths() {
        let baseline = json!({
            "era": "1923",
            "region": "Cornwall",
            "locale": "",
            "description": null
        });
        let errors = vec![
            ValidationError::missing_field("locale"),
            ValidationError::missing_field("description"),
            ValidationError::invalid_enum("era", "x", &["y"]),
        ];
        let payload = build_repair_request("intent text", &baseline, &errors, 0);

        let mut requested: Vec<String> = payload["repair_groups"]
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|g| g["errors"].as_array().unwrap())
            .map(|e| e["path"].as_str().unwrap().to_string())
            .collect();
        requested.sort();

        let mut expected: Vec<String> = errors.iter().map(|e| e.path.clone()).collect();
        expected.sort();
        assert_eq!(requested, expected);

        // Untouched containers are frozen, never requested.
        let frozen: Vec<&str> = payload["frozen_paths"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(frozen, vec!["region"]);
    }

    #[test]
    fn test_repair_request_reproduces_intent_and_baseline() {
        let baseline = json!({"summary": "", "history": [], "tensions": []});
        let errors = vec![ValidationError::missing_field("summary")];
        let payload = build_repair_request("Write the background.", &baseline, &errors, 0);

        assert_eq!(payload["task"], json!("Write the background."));
        assert_eq!(payload["baseline"], baseline);
        assert_eq!(payload["escalation_level"], json!(0));
    }

    #[test]
    fn test_escalation_adds_instruction() {
        let baseline = json!({"summary": ""});
        let errors = vec![ValidationError::missing_field("summary")];
        let calm = build_repair_request("t", &baseline, &errors, 0);
        let escalated = build_repair_request("t", &baseline, &errors, 1);

        let count = |v: &Value| v["instructions"].as_array().unwrap().len();
        assert!(count(&escalated) > count(&calm));
    }

    #[test]
    fn test_guardrails_for_discriminating_test_gap() {
        let errors = vec![ValidationError::semantic(
            "chapters",
            "no discriminating test is realized on the page; suspects are never explicitly ruled out",
        )];
        let guardrails = guardrails_for(&errors);
        assert!(guardrails.iter().any(|g| g.contains("ruled out")));
    }
}
