//! Typed validation errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a validation defect, ordered by empirical fix priority:
/// missing fields dominate failure counts and are cheapest to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A required path is absent or empty.
    MissingField,
    /// A field's runtime shape disagrees with its declared shape.
    TypeMismatch,
    /// A field's value is outside its declared allowed set.
    InvalidEnumValue,
    /// A cross-record narrative or continuity rule was violated.
    SemanticViolation,
}

impl ErrorCategory {
    /// Repair priority, lower first.
    #[must_use]
    pub fn priority(&self) -> usize {
        match self {
            Self::MissingField => 0,
            Self::TypeMismatch => 1,
            Self::InvalidEnumValue => 2,
            Self::SemanticViolation => 3,
        }
    }

    /// Returns the snake_case name of the category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::TypeMismatch => "type_mismatch",
            Self::InvalidEnumValue => "invalid_enum_value",
            Self::SemanticViolation => "semantic_violation",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structural or semantic defect, located by a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The defect category.
    pub category: ErrorCategory,
    /// Dotted locator with optional list indices, e.g. `members[2].role`.
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    /// Creates a missing-field error.
    #[must_use]
    pub fn missing_field(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            category: ErrorCategory::MissingField,
            message: format!("required field '{path}' is missing or empty"),
            path,
        }
    }

    /// Creates a type-mismatch error.
    #[must_use]
    pub fn type_mismatch(path: impl Into<String>, expected: &str, found: &str) -> Self {
        let path = path.into();
        Self {
            category: ErrorCategory::TypeMismatch,
            message: format!("field '{path}' expected {expected}, found {found}"),
            path,
        }
    }

    /// Creates an invalid-enum-value error.
    #[must_use]
    pub fn invalid_enum(path: impl Into<String>, value: &str, allowed: &[&str]) -> Self {
        let path = path.into();
        Self {
            category: ErrorCategory::InvalidEnumValue,
            message: format!(
                "field '{path}' has value '{value}', allowed: {}",
                allowed.join("|")
            ),
            path,
        }
    }

    /// Creates a semantic-violation error.
    #[must_use]
    pub fn semantic(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::SemanticViolation,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the nearest structural container of the error path.
    ///
    /// `members[2].role` belongs to `members[2]`; `crime.kind` to `crime`;
    /// a bare top-level path is its own container.
    #[must_use]
    pub fn container(&self) -> &str {
        match self.path.rfind('.') {
            Some(pos) => &self.path[..pos],
            None => &self.path,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// The result of validating one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no errors were found.
    pub valid: bool,
    /// Flat ordered error list, schema errors before semantic errors.
    pub errors: Vec<ValidationError>,
    /// Total number of checks both layers ran.
    pub checks_run: usize,
}

impl ValidationReport {
    /// Builds a report from an error list and check count.
    #[must_use]
    pub fn new(errors: Vec<ValidationError>, checks_run: usize) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            checks_run,
        }
    }

    /// Fraction of checks that passed, in `[0.0, 1.0]`.
    #[must_use]
    pub fn pass_fraction(&self) -> f64 {
        if self.checks_run == 0 {
            return 1.0;
        }
        let failed = self.errors.len().min(self.checks_run);
        (self.checks_run - failed) as f64 / self.checks_run as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_priority_order() {
        assert!(ErrorCategory::MissingField.priority() < ErrorCategory::TypeMismatch.priority());
        assert!(
            ErrorCategory::InvalidEnumValue.priority()
                < ErrorCategory::SemanticViolation.priority()
        );
    }

    #[test]
    fn test_missing_field_message() {
        let err = ValidationError::missing_field("crime.victim");
        assert_eq!(err.category, ErrorCategory::MissingField);
        assert_eq!(err.path, "crime.victim");
        assert!(err.message.contains("crime.victim"));
    }

    #[test]
    fn test_invalid_enum_message_lists_allowed() {
        let err = ValidationError::invalid_enum("members[0].role", "butler", &["detective", "suspect"]);
        assert!(err.message.contains("detective|suspect"));
        assert!(err.message.contains("butler"));
    }

    #[test]
    fn test_container() {
        assert_eq!(
            ValidationError::missing_field("members[2].role").container(),
            "members[2]"
        );
        assert_eq!(ValidationError::missing_field("crime.kind").container(), "crime");
        assert_eq!(ValidationError::missing_field("summary").container(), "summary");
        assert_eq!(
            ValidationError::missing_field("acts[0].scenes[1].title").container(),
            "acts[0].scenes[1]"
        );
    }

    #[test]
    fn test_report_pass_fraction() {
        let report = ValidationReport::new(vec![ValidationError::missing_field("a")], 10);
        assert!(!report.valid);
        assert!((report.pass_fraction() - 0.9).abs() < 1e-9);

        let clean = ValidationReport::new(vec![], 10);
        assert!(clean.valid);
        assert!((clean.pass_fraction() - 1.0).abs() < 1e-9);
    }
}
