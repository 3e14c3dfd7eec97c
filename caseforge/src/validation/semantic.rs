//! Semantic layer: cross-record narrative and continuity rules.
//!
//! Semantic checks read the artifact under validation together with the
//! read-only upstream artifacts it references (cast, clues, case model).
//! Each rule runs regardless of earlier failures and reports every
//! violation it finds.

use serde_json::Value;
use std::collections::HashSet;

use crate::core::ArtifactKind;
use crate::validation::error::ValidationError;

/// Read-only upstream artifacts available to semantic checks.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    upstream: std::collections::HashMap<ArtifactKind, Value>,
}

impl ValidationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an upstream artifact's content.
    pub fn insert(&mut self, kind: ArtifactKind, content: Value) {
        self.upstream.insert(kind, content);
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with_artifact(mut self, kind: ArtifactKind, content: Value) -> Self {
        self.insert(kind, content);
        self
    }

    /// Returns an upstream artifact's content, if present.
    #[must_use]
    pub fn get(&self, kind: ArtifactKind) -> Option<&Value> {
        self.upstream.get(&kind)
    }

    /// Cast members as `(name, role)` pairs.
    #[must_use]
    pub fn cast_members(&self) -> Vec<(String, String)> {
        self.get(ArtifactKind::Cast)
            .and_then(|cast| cast.get("members"))
            .and_then(Value::as_array)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|m| {
                        let name = m.get("name")?.as_str()?;
                        let role = m.get("role")?.as_str()?;
                        Some((name.to_string(), role.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All cast member names.
    #[must_use]
    pub fn cast_names(&self) -> Vec<String> {
        self.cast_members().into_iter().map(|(name, _)| name).collect()
    }

    /// Names of cast members with the given role.
    #[must_use]
    pub fn names_with_role(&self, role: &str) -> Vec<String> {
        self.cast_members()
            .into_iter()
            .filter(|(_, r)| r == role)
            .map(|(name, _)| name)
            .collect()
    }

    /// Clue ids from the clues artifact.
    #[must_use]
    pub fn clue_ids(&self) -> Vec<String> {
        self.get(ArtifactKind::Clues)
            .and_then(|clues| clues.get("clues"))
            .and_then(Value::as_array)
            .map(|clues| {
                clues
                    .iter()
                    .filter_map(|c| c.get("id")?.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The designated culprit from the case model.
    #[must_use]
    pub fn culprit(&self) -> Option<String> {
        self.get(ArtifactKind::CaseModel)
            .and_then(|cm| cm.get("culprit"))
            .and_then(Value::as_str)
            .map(String::from)
    }
}

/// Runs the semantic rules for an artifact kind.
///
/// Returns the violation list and the number of rules evaluated.
#[must_use]
pub fn check_semantics(
    kind: ArtifactKind,
    content: &Value,
    ctx: &ValidationContext,
) -> (Vec<ValidationError>, usize) {
    match kind {
        ArtifactKind::Setting | ArtifactKind::Background => (Vec::new(), 0),
        ArtifactKind::Cast => check_cast(content),
        ArtifactKind::HardLogicDevices => check_devices(content),
        ArtifactKind::CaseModel => check_case_model(content, ctx),
        ArtifactKind::CharacterProfiles => check_character_profiles(content, ctx),
        ArtifactKind::LocationProfiles => check_location_profiles(content),
        ArtifactKind::Clues => check_clues(content, ctx),
        ArtifactKind::Outline => check_outline(content, ctx),
        ArtifactKind::Prose => check_prose(content, ctx),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn object_list(content: &Value, key: &str) -> Vec<Value> {
    content
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(String::from)
}

fn check_cast(content: &Value) -> (Vec<ValidationError>, usize) {
    let mut errors = Vec::new();
    let members = object_list(content, "members");

    // Rule 1: names unique.
    let mut seen = HashSet::new();
    for (i, member) in members.iter().enumerate() {
        if let Some(name) = str_field(member, "name") {
            if !seen.insert(name.clone()) {
                errors.push(ValidationError::semantic(
                    format!("members[{i}].name"),
                    format!("cast member name '{name}' is duplicated"),
                ));
            }
        }
    }

    // Rule 2: at least one detective.
    let detectives = members
        .iter()
        .filter(|m| str_field(m, "role").as_deref() == Some("detective"))
        .count();
    if detectives == 0 {
        errors.push(ValidationError::semantic(
            "members",
            "cast has no detective",
        ));
    }

    // Rule 3: at least two suspects.
    let suspects = members
        .iter()
        .filter(|m| str_field(m, "role").as_deref() == Some("suspect"))
        .count();
    if suspects < 2 {
        errors.push(ValidationError::semantic(
            "members",
            format!("cast needs at least two suspects, found {suspects}"),
        ));
    }

    (errors, 3)
}

fn check_devices(content: &Value) -> (Vec<ValidationError>, usize) {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for (i, device) in object_list(content, "devices").iter().enumerate() {
        if let Some(name) = str_field(device, "name") {
            if !seen.insert(name.clone()) {
                errors.push(ValidationError::semantic(
                    format!("devices[{i}].name"),
                    format!("device name '{name}' is duplicated"),
                ));
            }
        }
    }
    (errors, 1)
}

fn check_case_model(content: &Value, ctx: &ValidationContext) -> (Vec<ValidationError>, usize) {
    let mut errors = Vec::new();
    let suspects: HashSet<String> = ctx.names_with_role("suspect").into_iter().collect();
    let cast_names: HashSet<String> = ctx.cast_names().into_iter().collect();
    let culprit = str_field(content, "culprit").unwrap_or_default();

    // Rule 1: the culprit is a suspect from the cast.
    if !culprit.is_empty() && !suspects.contains(&culprit) {
        errors.push(ValidationError::semantic(
            "culprit",
            format!("culprit '{culprit}' does not resolve to a cast suspect"),
        ));
    }

    // Rule 2: the deduction chain terminates in exactly the culprit.
    let mut excluded: HashSet<String> = HashSet::new();
    for step in object_list(content, "deduction_chain") {
        for name in string_list(step.get("excludes")) {
            excluded.insert(name);
        }
    }
    if !culprit.is_empty() {
        if excluded.contains(&culprit) {
            errors.push(ValidationError::semantic(
                "deduction_chain",
                format!("deduction chain excludes the designated culprit '{culprit}'"),
            ));
        }
        let mut unresolved: Vec<&String> = suspects
            .iter()
            .filter(|name| **name != culprit && !excluded.contains(*name))
            .collect();
        unresolved.sort();
        if !unresolved.is_empty() {
            errors.push(ValidationError::semantic(
                "deduction_chain",
                format!(
                    "deduction chain leaves more than one candidate: {} never excluded",
                    unresolved
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
    }

    // Rule 3: the discriminating test excludes all suspects but the culprit.
    let test_excludes: HashSet<String> = string_list(
        content
            .get("discriminating_test")
            .and_then(|t| t.get("excludes")),
    )
    .into_iter()
    .collect();
    if !culprit.is_empty() {
        if test_excludes.contains(&culprit) {
            errors.push(ValidationError::semantic(
                "discriminating_test.excludes",
                format!("discriminating test excludes the designated culprit '{culprit}'"),
            ));
        }
        let mut untested: Vec<&String> = suspects
            .iter()
            .filter(|name| **name != culprit && !test_excludes.contains(*name))
            .collect();
        untested.sort();
        if !untested.is_empty() {
            errors.push(ValidationError::semantic(
                "discriminating_test.excludes",
                format!(
                    "discriminating test does not exclude every other candidate: {} missing",
                    untested
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
    }

    // Rule 4: no red herring cites the discriminating fact.
    let test_description = content
        .get("discriminating_test")
        .and_then(|t| t.get("description"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    for (i, herring) in object_list(content, "red_herrings").iter().enumerate() {
        if let Some(fact) = str_field(herring, "cited_fact") {
            if !test_description.is_empty() && fact.trim().to_lowercase() == test_description {
                errors.push(ValidationError::semantic(
                    format!("red_herrings[{i}].cited_fact"),
                    "red herring cites the same discriminating fact as the true solution",
                ));
            }
        }
    }

    // Rule 5: red herrings point at cast members.
    for (i, herring) in object_list(content, "red_herrings").iter().enumerate() {
        if let Some(target) = str_field(herring, "points_to") {
            if !cast_names.contains(&target) {
                errors.push(ValidationError::semantic(
                    format!("red_herrings[{i}].points_to"),
                    format!("red herring points at '{target}', not a cast member"),
                ));
            }
        }
    }

    (errors, 5)
}

fn check_character_profiles(
    content: &Value,
    ctx: &ValidationContext,
) -> (Vec<ValidationError>, usize) {
    let mut errors = Vec::new();
    let cast_names: HashSet<String> = ctx.cast_names().into_iter().collect();
    for (i, profile) in object_list(content, "profiles").iter().enumerate() {
        if let Some(name) = str_field(profile, "name") {
            if !cast_names.contains(&name) {
                errors.push(ValidationError::semantic(
                    format!("profiles[{i}].name"),
                    format!("profile '{name}' does not resolve to a cast member"),
                ));
            }
        }
    }
    (errors, 1)
}

fn check_location_profiles(content: &Value) -> (Vec<ValidationError>, usize) {
    let mut errors = Vec::new();
    let names: HashSet<String> = object_list(content, "profiles")
        .iter()
        .filter_map(|p| str_field(p, "name"))
        .collect();
    for (i, profile) in object_list(content, "profiles").iter().enumerate() {
        for (j, connection) in string_list(profile.get("connections")).iter().enumerate() {
            if !names.contains(connection) {
                errors.push(ValidationError::semantic(
                    format!("profiles[{i}].connections[{j}]"),
                    format!("connection '{connection}' does not resolve to a location profile"),
                ));
            }
        }
    }
    (errors, 1)
}

fn check_clues(content: &Value, ctx: &ValidationContext) -> (Vec<ValidationError>, usize) {
    let mut errors = Vec::new();
    let cast_names: HashSet<String> = ctx.cast_names().into_iter().collect();
    let clues = object_list(content, "clues");

    // Rule 1: ids unique.
    let mut seen = HashSet::new();
    for (i, clue) in clues.iter().enumerate() {
        if let Some(id) = str_field(clue, "id") {
            if !seen.insert(id.clone()) {
                errors.push(ValidationError::semantic(
                    format!("clues[{i}].id"),
                    format!("clue id '{id}' is duplicated"),
                ));
            }
        }
    }

    // Rules 2 and 3: discoverer and implicated party resolve to the cast.
    for (i, clue) in clues.iter().enumerate() {
        if let Some(name) = str_field(clue, "discovered_by") {
            if !cast_names.contains(&name) {
                errors.push(ValidationError::semantic(
                    format!("clues[{i}].discovered_by"),
                    format!("clue discoverer '{name}' does not resolve to a cast member"),
                ));
            }
        }
        if let Some(name) = str_field(clue, "implicates") {
            if !cast_names.contains(&name) {
                errors.push(ValidationError::semantic(
                    format!("clues[{i}].implicates"),
                    format!("clue implicates '{name}', not a cast member"),
                ));
            }
        }
    }

    (errors, 3)
}

fn check_outline(content: &Value, ctx: &ValidationContext) -> (Vec<ValidationError>, usize) {
    let mut errors = Vec::new();
    let cast_names: HashSet<String> = ctx.cast_names().into_iter().collect();
    let clue_ids: HashSet<String> = ctx.clue_ids().into_iter().collect();

    for (a, act) in object_list(content, "acts").iter().enumerate() {
        let scenes = act
            .get("scenes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for (s, scene) in scenes.iter().enumerate() {
            for (c, name) in string_list(scene.get("characters")).iter().enumerate() {
                if !cast_names.contains(name) {
                    errors.push(ValidationError::semantic(
                        format!("acts[{a}].scenes[{s}].characters[{c}]"),
                        format!("scene character '{name}' does not resolve to a cast member"),
                    ));
                }
            }
            for (c, id) in string_list(scene.get("clue_refs")).iter().enumerate() {
                if !clue_ids.contains(id) {
                    errors.push(ValidationError::semantic(
                        format!("acts[{a}].scenes[{s}].clue_refs[{c}]"),
                        format!("clue reference '{id}' does not resolve to a clue"),
                    ));
                }
            }
        }
    }

    (errors, 2)
}

/// Phrases that count as on-page elimination of a suspect.
const ELIMINATION_PHRASES: &[&str] = &["ruled out", "cannot be the culprit", "excluded by"];

fn chapter_texts(content: &Value) -> Vec<String> {
    object_list(content, "chapters")
        .iter()
        .map(|chapter| string_list(chapter.get("paragraphs")).join("\n\n"))
        .collect()
}

fn check_prose(content: &Value, ctx: &ValidationContext) -> (Vec<ValidationError>, usize) {
    let mut errors = Vec::new();
    let chapters = chapter_texts(content);
    let lowered: Vec<String> = chapters.iter().map(|t| t.to_lowercase()).collect();
    let members = ctx.cast_members();
    let culprit = ctx.culprit().unwrap_or_default();

    // Rule 1: identity continuity after an arrest.
    for (name, role) in &members {
        let name_lower = name.to_lowercase();
        let arrest_chapter = lowered.iter().position(|text| {
            text.contains(&format!("{name_lower} was arrested"))
                || text.contains(&format!("{name_lower} is arrested"))
                || text.contains(&format!("arrested {name_lower}"))
        });
        if let Some(arrested_in) = arrest_chapter {
            for (i, text) in lowered.iter().enumerate().skip(arrested_in + 1) {
                for label in crate::validation::schema::CAST_ROLES {
                    if *label == role.as_str() {
                        continue;
                    }
                    let prefixed = format!("the {label} {name_lower}");
                    let suffixed = format!("{name_lower}, the {label}");
                    if text.contains(&prefixed) || text.contains(&suffixed) {
                        errors.push(ValidationError::semantic(
                            format!("chapters[{i}]"),
                            format!(
                                "identity continuity break: '{name}' appears as '{label}' after being arrested"
                            ),
                        ));
                    }
                }
            }
        }
    }

    // Rule 2: the discriminating test is realized with elimination language.
    let has_elimination = lowered
        .iter()
        .any(|text| ELIMINATION_PHRASES.iter().any(|p| text.contains(p)));
    if !has_elimination {
        errors.push(ValidationError::semantic(
            "chapters",
            "no discriminating test is realized on the page; suspects are never explicitly ruled out",
        ));
    }

    // Rule 3: the culprit is implicated in the final chapter.
    if !culprit.is_empty() {
        let implicated = lowered
            .last()
            .is_some_and(|text| text.contains(&culprit.to_lowercase()));
        if !implicated {
            let last = chapters.len().saturating_sub(1);
            errors.push(ValidationError::semantic(
                format!("chapters[{last}]"),
                format!("culprit '{culprit}' is never implicated in the final chapter"),
            ));
        }
    }

    // Rule 4: every suspect thread is closed on the page.
    let mut open: Vec<String> = members
        .iter()
        .filter(|(_, role)| role == "suspect")
        .filter(|(name, _)| {
            let name_lower = name.to_lowercase();
            !lowered.iter().any(|text| text.contains(&name_lower))
        })
        .map(|(name, _)| name.clone())
        .collect();
    open.sort();
    for name in open {
        errors.push(ValidationError::semantic(
            "chapters",
            format!("suspect thread left open: '{name}' never appears in the prose"),
        ));
    }

    (errors, 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cast_content() -> Value {
        json!({
            "members": [
                {"name": "Margaret Voss", "role": "detective", "motive": "duty", "alibi": "n/a"},
                {"name": "Edmund Carrow", "role": "suspect", "motive": "debt", "alibi": "the club"},
                {"name": "Lila Penn", "role": "suspect", "motive": "jealousy", "alibi": "the garden"},
                {"name": "Thomas Abernathy", "role": "victim", "motive": "none", "alibi": "none"}
            ]
        })
    }

    fn context_with_cast() -> ValidationContext {
        ValidationContext::new().with_artifact(ArtifactKind::Cast, cast_content())
    }

    #[test]
    fn test_cast_passes() {
        let (errors, checks) = check_semantics(ArtifactKind::Cast, &cast_content(), &ValidationContext::new());
        assert!(errors.is_empty());
        assert_eq!(checks, 3);
    }

    #[test]
    fn test_cast_duplicate_and_missing_detective() {
        let content = json!({
            "members": [
                {"name": "A", "role": "suspect", "motive": "m", "alibi": "a"},
                {"name": "A", "role": "suspect", "motive": "m", "alibi": "a"}
            ]
        });
        let (errors, _) = check_semantics(ArtifactKind::Cast, &content, &ValidationContext::new());
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("duplicated"));
        assert!(errors[1].message.contains("no detective"));
    }

    fn valid_case_model() -> Value {
        json!({
            "crime": {"kind": "murder", "victim": "Thomas Abernathy", "scene": "the study", "time": "midnight"},
            "culprit": "Edmund Carrow",
            "deduction_chain": [
                {"premise": "The study door was locked from inside", "inference": "Only someone with the spare key could leave", "excludes": ["Lila Penn"]}
            ],
            "discriminating_test": {
                "description": "Only the keyholder could have rewound the hall clock",
                "excludes": ["Lila Penn"]
            },
            "red_herrings": [
                {"description": "A torn glove in the garden", "cited_fact": "gloves by the roses", "points_to": "Lila Penn"}
            ]
        })
    }

    #[test]
    fn test_case_model_passes() {
        let (errors, checks) =
            check_semantics(ArtifactKind::CaseModel, &valid_case_model(), &context_with_cast());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(checks, 5);
    }

    #[test]
    fn test_case_model_unresolved_culprit() {
        let mut cm = valid_case_model();
        cm["culprit"] = json!("Nobody Known");
        let (errors, _) = check_semantics(ArtifactKind::CaseModel, &cm, &context_with_cast());
        assert!(errors.iter().any(|e| e.path == "culprit"));
    }

    #[test]
    fn test_case_model_chain_leaves_two_candidates() {
        let mut cm = valid_case_model();
        cm["deduction_chain"] = json!([]);
        let (errors, _) = check_semantics(ArtifactKind::CaseModel, &cm, &context_with_cast());
        assert!(errors
            .iter()
            .any(|e| e.path == "deduction_chain" && e.message.contains("Lila Penn")));
    }

    #[test]
    fn test_case_model_red_herring_cites_discriminating_fact() {
        let mut cm = valid_case_model();
        cm["red_herrings"][0]["cited_fact"] =
            json!("Only the keyholder could have rewound the hall clock");
        let (errors, _) = check_semantics(ArtifactKind::CaseModel, &cm, &context_with_cast());
        assert!(errors
            .iter()
            .any(|e| e.path == "red_herrings[0].cited_fact"));
    }

    #[test]
    fn test_clues_unresolved_names() {
        let content = json!({
            "clues": [
                {"id": "c1", "description": "d", "location": "study", "discovered_by": "Margaret Voss", "implicates": "A Stranger", "veracity": "genuine"}
            ]
        });
        let (errors, _) = check_semantics(ArtifactKind::Clues, &content, &context_with_cast());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "clues[0].implicates");
    }

    #[test]
    fn test_outline_unknown_clue_ref() {
        let ctx = context_with_cast().with_artifact(
            ArtifactKind::Clues,
            json!({"clues": [{"id": "c1", "description": "d", "location": "l", "discovered_by": "Margaret Voss", "implicates": "Edmund Carrow", "veracity": "genuine"}]}),
        );
        let content = json!({
            "acts": [{"number": 1, "title": "t", "scenes": [
                {"number": 1, "title": "s", "summary": "x", "characters": ["Margaret Voss"], "clue_refs": ["c9"]}
            ]}]
        });
        let (errors, _) = check_semantics(ArtifactKind::Outline, &content, &ctx);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "acts[0].scenes[0].clue_refs[0]");
    }

    fn prose_context() -> ValidationContext {
        context_with_cast().with_artifact(ArtifactKind::CaseModel, valid_case_model())
    }

    fn closing_prose() -> Value {
        json!({
            "chapters": [
                {"number": 1, "title": "The Study", "paragraphs": [
                    "Margaret Voss examined the locked door while Edmund Carrow and Lila Penn waited in the hall."
                ]},
                {"number": 2, "title": "The Clock", "paragraphs": [
                    "Lila Penn was ruled out by the timeline; only the keyholder could have rewound the hall clock.",
                    "Edmund Carrow was arrested before dawn."
                ]}
            ]
        })
    }

    #[test]
    fn test_prose_passes() {
        let (errors, checks) = check_semantics(ArtifactKind::Prose, &closing_prose(), &prose_context());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(checks, 4);
    }

    #[test]
    fn test_prose_missing_elimination_language() {
        let content = json!({
            "chapters": [
                {"number": 1, "title": "t", "paragraphs": [
                    "Margaret Voss pondered. Edmund Carrow confessed. Lila Penn wept."
                ]}
            ]
        });
        let (errors, _) = check_semantics(ArtifactKind::Prose, &content, &prose_context());
        assert!(errors
            .iter()
            .any(|e| e.message.contains("never explicitly ruled out")));
    }

    #[test]
    fn test_prose_identity_continuity_break() {
        let content = json!({
            "chapters": [
                {"number": 1, "title": "t", "paragraphs": [
                    "Lila Penn was ruled out. Edmund Carrow was arrested at the pier."
                ]},
                {"number": 2, "title": "t2", "paragraphs": [
                    "The next morning the witness Edmund Carrow gave his account to the papers."
                ]}
            ]
        });
        let (errors, _) = check_semantics(ArtifactKind::Prose, &content, &prose_context());
        assert!(errors
            .iter()
            .any(|e| e.message.contains("identity continuity break")));
    }

    #[test]
    fn test_prose_open_suspect_thread() {
        let content = json!({
            "chapters": [
                {"number": 1, "title": "t", "paragraphs": [
                    "Lila Penn was ruled out by the clock. Edmund Carrow fled."
                ]}
            ]
        });
        // Lila and Edmund both appear; add a third suspect who never does.
        let mut cast = cast_content();
        cast["members"]
            .as_array_mut()
            .unwrap()
            .push(json!({"name": "Silas Mure", "role": "suspect", "motive": "m", "alibi": "a"}));
        let ctx = ValidationContext::new()
            .with_artifact(ArtifactKind::Cast, cast)
            .with_artifact(ArtifactKind::CaseModel, valid_case_model());
        let (errors, _) = check_semantics(ArtifactKind::Prose, &content, &ctx);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("Silas Mure")));
    }
}
