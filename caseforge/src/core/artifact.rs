//! Versioned stage artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stages::StageName;
use crate::validation::ValidationError;

/// The kind of structured document a stage produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Story-world setting.
    Setting,
    /// Shared history and tensions.
    Background,
    /// Cast roster.
    Cast,
    /// Mechanical case devices.
    HardLogicDevices,
    /// Structured case model.
    CaseModel,
    /// Character enrichment profiles.
    CharacterProfiles,
    /// Location enrichment profiles.
    LocationProfiles,
    /// Clue list.
    Clues,
    /// Act/scene outline.
    Outline,
    /// Narrative prose.
    Prose,
}

impl ArtifactKind {
    /// Returns the snake_case name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setting => "setting",
            Self::Background => "background",
            Self::Cast => "cast",
            Self::HardLogicDevices => "hard_logic_devices",
            Self::CaseModel => "case_model",
            Self::CharacterProfiles => "character_profiles",
            Self::LocationProfiles => "location_profiles",
            Self::Clues => "clues",
            Self::Outline => "outline",
            Self::Prose => "prose",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validation state of an artifact version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Produced but not yet checked.
    #[default]
    Unvalidated,
    /// Passed both validation layers; immutable from here on.
    Valid,
    /// Failed validation; errors are attached.
    Invalid,
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unvalidated => write!(f, "unvalidated"),
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// One version of a stage's structured output.
///
/// Versions increment on every revision. A run holds at most one current
/// version per stage; prior versions are retained for audit. Once marked
/// valid an artifact is treated as immutable, read-only context for
/// downstream stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// The producing stage.
    pub stage: StageName,
    /// The kind of document this is.
    pub kind: ArtifactKind,
    /// Version number, starting at 1.
    pub version: u32,
    /// The raw structured content.
    pub content: serde_json::Value,
    /// Validation status at last check.
    pub status: ArtifactStatus,
    /// Errors from the last validation pass.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,
    /// Set when a soft-failable stage was kept despite residual errors.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
    /// When this version was created (ISO 8601).
    pub created_at: String,
}

impl Artifact {
    /// Creates version 1 of a stage's artifact.
    #[must_use]
    pub fn new(stage: StageName, content: serde_json::Value) -> Self {
        Self {
            stage,
            kind: stage.kind(),
            version: 1,
            content,
            status: ArtifactStatus::Unvalidated,
            errors: Vec::new(),
            degraded: false,
            created_at: crate::utils::iso_timestamp(),
        }
    }

    /// Creates the next version with new content.
    #[must_use]
    pub fn next_version(&self, content: serde_json::Value) -> Self {
        Self {
            stage: self.stage,
            kind: self.kind,
            version: self.version + 1,
            content,
            status: ArtifactStatus::Unvalidated,
            errors: Vec::new(),
            degraded: false,
            created_at: crate::utils::iso_timestamp(),
        }
    }

    /// Marks the artifact valid, clearing any recorded errors.
    pub fn mark_valid(&mut self) {
        self.status = ArtifactStatus::Valid;
        self.errors.clear();
    }

    /// Marks the artifact invalid with the given errors.
    pub fn mark_invalid(&mut self, errors: Vec<ValidationError>) {
        self.status = ArtifactStatus::Invalid;
        self.errors = errors;
    }

    /// Returns true if the artifact has passed validation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == ArtifactStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_artifact_defaults() {
        let artifact = Artifact::new(StageName::Cast, json!({"members": []}));
        assert_eq!(artifact.version, 1);
        assert_eq!(artifact.kind, ArtifactKind::Cast);
        assert_eq!(artifact.status, ArtifactStatus::Unvalidated);
        assert!(!artifact.degraded);
    }

    #[test]
    fn test_next_version_increments() {
        let v1 = Artifact::new(StageName::Prose, json!({"chapters": []}));
        let v2 = v1.next_version(json!({"chapters": [{}]}));
        assert_eq!(v2.version, 2);
        assert_eq!(v2.status, ArtifactStatus::Unvalidated);
        assert_eq!(v2.stage, StageName::Prose);
    }

    #[test]
    fn test_mark_valid_clears_errors() {
        let mut artifact = Artifact::new(StageName::Setting, json!({}));
        artifact.mark_invalid(vec![ValidationError::missing_field("era")]);
        assert_eq!(artifact.status, ArtifactStatus::Invalid);
        assert_eq!(artifact.errors.len(), 1);

        artifact.mark_valid();
        assert!(artifact.is_valid());
        assert!(artifact.errors.is_empty());
    }

    #[test]
    fn test_artifact_serialization_roundtrip() {
        let artifact = Artifact::new(StageName::Clues, json!({"clues": []}));
        let text = serde_json::to_string(&artifact).unwrap();
        let back: Artifact = serde_json::from_str(&text).unwrap();
        assert_eq!(back.stage, StageName::Clues);
        assert_eq!(back.version, 1);
    }
}
