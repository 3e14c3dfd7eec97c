//! Static stage configuration.
//!
//! Stages are a fixed total order; only their outcomes are persisted per
//! run. Each stage declares the upstream stages whose valid artifacts feed
//! its generation context, the artifact kind it produces, and its attempt
//! ceilings.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::core::ArtifactKind;

/// The named steps of the pipeline, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Era, region, and locale of the story world.
    Setting,
    /// Shared history and tensions behind the crime.
    Background,
    /// The cast of characters with roles, motives, and alibis.
    Cast,
    /// Mechanical devices the logic of the case relies on.
    HardLogicDevices,
    /// The structured case model: crime, culprit, deduction chain.
    CaseModel,
    /// Per-character enrichment profiles.
    CharacterProfiles,
    /// Per-location enrichment profiles.
    LocationProfiles,
    /// Discoverable clues, genuine and misleading.
    Clues,
    /// Act and scene outline.
    Outline,
    /// The narrative prose itself.
    Prose,
}

impl StageName {
    /// Returns the snake_case name of the stage.
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

    /// Returns the artifact kind this stage produces.
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Setting => ArtifactKind::Setting,
            Self::Background => ArtifactKind::Background,
            Self::Cast => ArtifactKind::Cast,
            Self::HardLogicDevices => ArtifactKind::HardLogicDevices,
            Self::CaseModel => ArtifactKind::CaseModel,
            Self::CharacterProfiles => ArtifactKind::CharacterProfiles,
            Self::LocationProfiles => ArtifactKind::LocationProfiles,
            Self::Clues => ArtifactKind::Clues,
            Self::Outline => ArtifactKind::Outline,
            Self::Prose => ArtifactKind::Prose,
        }
    }

    /// Returns the generation intent for this stage.
    ///
    /// The intent is reproduced verbatim in repair requests so a repair
    /// carries the same task framing as the original call.
    #[must_use]
    pub fn intent(&self) -> &'static str {
        match self {
            Self::Setting => "Establish the era, region, and locale of the mystery.",
            Self::Background => {
                "Write the shared history and standing tensions behind the crime."
            }
            Self::Cast => {
                "Create the cast: one detective, the victim, witnesses, and at least two suspects, each with a motive and an alibi."
            }
            Self::HardLogicDevices => {
                "Define the mechanical devices (timetables, locks, documents) the case logic relies on, with their rules."
            }
            Self::CaseModel => {
                "Construct the case model: the crime, the culprit, a deduction chain that excludes every other suspect, a discriminating test, and red herrings."
            }
            Self::CharacterProfiles => {
                "Write an enrichment profile for each cast member: appearance, manner, secrets."
            }
            Self::LocationProfiles => {
                "Write an enrichment profile for each significant location and how the locations connect."
            }
            Self::Clues => {
                "Generate the discoverable clues, marking each genuine or a red herring, with who finds it and whom it implicates."
            }
            Self::Outline => {
                "Outline the story in acts and scenes, placing characters and clue discoveries."
            }
            Self::Prose => {
                "Write the full narrative prose in chapters, realizing the outline, the clues, and the solution on the page."
            }
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration of one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    /// The stage name.
    pub name: StageName,
    /// Upstream stages whose valid artifacts this stage consumes.
    pub depends_on: Vec<StageName>,
    /// Maximum generation attempts (transport retries and parse retries).
    pub max_generation_attempts: usize,
    /// Maximum revision attempts after a validation failure.
    pub max_revision_attempts: usize,
    /// Mandatory stages abort the run on failure; soft stages degrade.
    pub mandatory: bool,
}

impl StageSpec {
    /// Creates a mandatory stage with default ceilings.
    #[must_use]
    pub fn new(name: StageName, depends_on: Vec<StageName>) -> Self {
        Self {
            name,
            depends_on,
            max_generation_attempts: 3,
            max_revision_attempts: 3,
            mandatory: true,
        }
    }

    /// Marks the stage soft-failable: a degraded artifact lets the run
    /// continue.
    #[must_use]
    pub fn soft(mut self) -> Self {
        self.mandatory = false;
        self
    }

    /// Sets the generation attempt ceiling.
    #[must_use]
    pub fn with_max_generation_attempts(mut self, attempts: usize) -> Self {
        self.max_generation_attempts = attempts;
        self
    }

    /// Sets the revision attempt ceiling.
    #[must_use]
    pub fn with_max_revision_attempts(mut self, attempts: usize) -> Self {
        self.max_revision_attempts = attempts;
        self
    }
}

/// Returns the fixed stage order of the mystery pipeline.
///
/// Cast feeds clue generation, clues feed the outline, the outline feeds
/// prose. The profile stages are enrichment: prose tolerates their absence,
/// so they are soft-failable.
#[must_use]
pub fn default_stages() -> Vec<StageSpec> {
    use StageName::{
        Background, CaseModel, Cast, CharacterProfiles, Clues, HardLogicDevices,
        LocationProfiles, Outline, Prose, Setting,
    };

    vec![
        StageSpec::new(Setting, vec![]),
        StageSpec::new(Background, vec![Setting]),
        StageSpec::new(Cast, vec![Setting, Background]),
        StageSpec::new(HardLogicDevices, vec![Background]),
        StageSpec::new(CaseModel, vec![Cast, HardLogicDevices]),
        StageSpec::new(CharacterProfiles, vec![Cast]).soft(),
        StageSpec::new(LocationProfiles, vec![Setting]).soft(),
        StageSpec::new(Clues, vec![CaseModel, Cast]),
        StageSpec::new(Outline, vec![Clues, CaseModel]),
        StageSpec::new(
            Prose,
            vec![Outline, Cast, CharacterProfiles, LocationProfiles],
        ),
    ]
}

/// Validates that every stage's dependencies appear earlier in the order.
///
/// # Errors
///
/// Returns a message naming the first stage whose dependency is missing or
/// declared later.
pub fn validate_order(stages: &[StageSpec]) -> Result<(), String> {
    let mut seen: HashSet<StageName> = HashSet::new();
    for spec in stages {
        for dep in &spec.depends_on {
            if !seen.contains(dep) {
                return Err(format!(
                    "stage '{}' depends on '{}', which is not declared earlier",
                    spec.name, dep
                ));
            }
        }
        if !seen.insert(spec.name) {
            return Err(format!("stage '{}' is declared twice", spec.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_display() {
        assert_eq!(StageName::HardLogicDevices.to_string(), "hard_logic_devices");
        assert_eq!(StageName::Prose.to_string(), "prose");
    }

    #[test]
    fn test_stage_name_serialize() {
        let json = serde_json::to_string(&StageName::CaseModel).unwrap();
        assert_eq!(json, r#""case_model""#);
    }

    #[test]
    fn test_default_stages_order_valid() {
        let stages = default_stages();
        assert_eq!(stages.len(), 10);
        assert!(validate_order(&stages).is_ok());
    }

    #[test]
    fn test_default_stages_first_and_last() {
        let stages = default_stages();
        assert_eq!(stages[0].name, StageName::Setting);
        assert_eq!(stages[stages.len() - 1].name, StageName::Prose);
    }

    #[test]
    fn test_profile_stages_are_soft() {
        let stages = default_stages();
        for spec in &stages {
            let expect_soft = matches!(
                spec.name,
                StageName::CharacterProfiles | StageName::LocationProfiles
            );
            assert_eq!(spec.mandatory, !expect_soft, "stage {}", spec.name);
        }
    }

    #[test]
    fn test_validate_order_rejects_forward_dependency() {
        let stages = vec![
            StageSpec::new(StageName::Background, vec![StageName::Setting]),
            StageSpec::new(StageName::Setting, vec![]),
        ];
        let err = validate_order(&stages).unwrap_err();
        assert!(err.contains("background"));
    }

    #[test]
    fn test_validate_order_rejects_duplicate() {
        let stages = vec![
            StageSpec::new(StageName::Setting, vec![]),
            StageSpec::new(StageName::Setting, vec![]),
        ];
        assert!(validate_order(&stages).is_err());
    }

    #[test]
    fn test_stage_ceiling_builders() {
        let spec = StageSpec::new(StageName::Prose, vec![])
            .with_max_generation_attempts(5)
            .with_max_revision_attempts(2);
        assert_eq!(spec.max_generation_attempts, 5);
        assert_eq!(spec.max_revision_attempts, 2);
    }
}
