//! Validation engine: schema and semantic layers.
//!
//! `validate` is a pure function over the artifact content and its upstream
//! context. Both layers always run; the flat error list keeps schema errors
//! ahead of semantic errors and is never deduplicated here. Aggregation
//! happens in the revision engine.

mod error;
pub mod schema;
mod semantic;

pub use error::{ErrorCategory, ValidationError, ValidationReport};
pub use schema::{check_schema, schema_for, FieldShape, FieldSpec};
pub use semantic::{check_semantics, ValidationContext};

use serde_json::Value;

use crate::core::ArtifactKind;

/// Validates an artifact's content against its declared schema and the
/// semantic rules of its kind.
#[must_use]
pub fn validate(kind: ArtifactKind, content: &Value, ctx: &ValidationContext) -> ValidationReport {
    let (mut errors, schema_checks) = check_schema(kind, content);
    let (semantic_errors, semantic_checks) = check_semantics(kind, content, ctx);
    errors.extend(semantic_errors);
    ValidationReport::new(errors, schema_checks + semantic_checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_errors_precede_semantic_errors() {
        // Cast with a missing alibi (schema) and no detective (semantic).
        let content = json!({
            "members": [
                {"name": "A", "role": "suspect", "motive": "m"},
                {"name": "B", "role": "suspect", "motive": "m", "alibi": "x"}
            ]
        });
        let report = validate(ArtifactKind::Cast, &content, &ValidationContext::new());
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].category, ErrorCategory::MissingField);
        assert_eq!(report.errors[1].category, ErrorCategory::SemanticViolation);
    }

    #[test]
    fn test_validation_is_idempotent_on_valid_input() {
        let content = json!({
            "era": "1923",
            "region": "Cornwall",
            "locale": "Trewithen Hall",
            "description": "A granite manor above the sea."
        });
        let ctx = ValidationContext::new();
        let first = validate(ArtifactKind::Setting, &content, &ctx);
        assert!(first.valid);
        let second = validate(ArtifactKind::Setting, &content, &ctx);
        assert!(second.valid);
        assert!(second.errors.is_empty());
    }

    #[test]
    fn test_checks_run_counts_both_layers() {
        let content = json!({
            "members": [
                {"name": "A", "role": "detective", "motive": "m", "alibi": "x"},
                {"name": "B", "role": "suspect", "motive": "m", "alibi": "x"},
                {"name": "C", "role": "suspect", "motive": "m", "alibi": "x"}
            ]
        });
        let report = validate(ArtifactKind::Cast, &content, &ValidationContext::new());
        assert!(report.valid);
        // 1 container field + 4 fields per member * 3 members + 3 semantic rules.
        assert_eq!(report.checks_run, 1 + 12 + 3);
    }
}
