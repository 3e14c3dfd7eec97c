//! Schema layer: declared field sets per artifact kind.
//!
//! Generation port responses are untyped documents, so every artifact kind
//! declares its required fields as data (name, expected shape, allowed
//! values) and the walker checks the document against that declaration.
//! The walker never short-circuits: the full error list is required for
//! effective revision.

use serde_json::Value;

use crate::core::ArtifactKind;
use crate::validation::error::ValidationError;

/// Expected shape of a required field.
#[derive(Debug, Clone, Copy)]
pub enum FieldShape {
    /// Non-empty string.
    Text,
    /// JSON number.
    Number,
    /// List of strings.
    TextList,
    /// Nested object with its own required fields.
    Object(&'static [FieldSpec]),
    /// List of objects, each with the given required fields.
    ObjectList(&'static [FieldSpec]),
    /// String restricted to an allowed set.
    Enum(&'static [&'static str]),
}

/// One required field declaration.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name within its container.
    pub name: &'static str,
    /// Expected shape.
    pub shape: FieldShape,
}

const fn field(name: &'static str, shape: FieldShape) -> FieldSpec {
    FieldSpec { name, shape }
}

/// Cast member roles.
pub const CAST_ROLES: &[&str] = &["detective", "suspect", "witness", "victim", "bystander"];
/// Device kinds.
pub const DEVICE_KINDS: &[&str] = &["timetable", "lock", "alibi_device", "forensic", "document"];
/// Crime kinds.
pub const CRIME_KINDS: &[&str] = &["murder", "theft", "disappearance", "blackmail"];
/// Clue veracity values.
pub const CLUE_VERACITY: &[&str] = &["genuine", "red_herring"];

const SETTING_FIELDS: &[FieldSpec] = &[
    field("era", FieldShape::Text),
    field("region", FieldShape::Text),
    field("locale", FieldShape::Text),
    field("description", FieldShape::Text),
];

const BACKGROUND_FIELDS: &[FieldSpec] = &[
    field("summary", FieldShape::Text),
    field("history", FieldShape::TextList),
    field("tensions", FieldShape::TextList),
];

const CAST_MEMBER_FIELDS: &[FieldSpec] = &[
    field("name", FieldShape::Text),
    field("role", FieldShape::Enum(CAST_ROLES)),
    field("motive", FieldShape::Text),
    field("alibi", FieldShape::Text),
];

const CAST_FIELDS: &[FieldSpec] = &[field("members", FieldShape::ObjectList(CAST_MEMBER_FIELDS))];

const DEVICE_FIELDS: &[FieldSpec] = &[
    field("name", FieldShape::Text),
    field("kind", FieldShape::Enum(DEVICE_KINDS)),
    field("rules", FieldShape::TextList),
];

const HARD_LOGIC_FIELDS: &[FieldSpec] = &[field("devices", FieldShape::ObjectList(DEVICE_FIELDS))];

const CRIME_FIELDS: &[FieldSpec] = &[
    field("kind", FieldShape::Enum(CRIME_KINDS)),
    field("victim", FieldShape::Text),
    field("scene", FieldShape::Text),
    field("time", FieldShape::Text),
];

const DEDUCTION_STEP_FIELDS: &[FieldSpec] = &[
    field("premise", FieldShape::Text),
    field("inference", FieldShape::Text),
    field("excludes", FieldShape::TextList),
];

const DISCRIMINATING_TEST_FIELDS: &[FieldSpec] = &[
    field("description", FieldShape::Text),
    field("excludes", FieldShape::TextList),
];

const RED_HERRING_FIELDS: &[FieldSpec] = &[
    field("description", FieldShape::Text),
    field("cited_fact", FieldShape::Text),
    field("points_to", FieldShape::Text),
];

const CASE_MODEL_FIELDS: &[FieldSpec] = &[
    field("crime", FieldShape::Object(CRIME_FIELDS)),
    field("culprit", FieldShape::Text),
    field("deduction_chain", FieldShape::ObjectList(DEDUCTION_STEP_FIELDS)),
    field(
        "discriminating_test",
        FieldShape::Object(DISCRIMINATING_TEST_FIELDS),
    ),
    field("red_herrings", FieldShape::ObjectList(RED_HERRING_FIELDS)),
];

const CHARACTER_PROFILE_FIELDS: &[FieldSpec] = &[
    field("name", FieldShape::Text),
    field("appearance", FieldShape::Text),
    field("manner", FieldShape::Text),
    field("secrets", FieldShape::TextList),
];

const CHARACTER_PROFILES_FIELDS: &[FieldSpec] = &[field(
    "profiles",
    FieldShape::ObjectList(CHARACTER_PROFILE_FIELDS),
)];

const LOCATION_PROFILE_FIELDS: &[FieldSpec] = &[
    field("name", FieldShape::Text),
    field("description", FieldShape::Text),
    field("connections", FieldShape::TextList),
];

const LOCATION_PROFILES_FIELDS: &[FieldSpec] = &[field(
    "profiles",
    FieldShape::ObjectList(LOCATION_PROFILE_FIELDS),
)];

const CLUE_FIELDS: &[FieldSpec] = &[
    field("id", FieldShape::Text),
    field("description", FieldShape::Text),
    field("location", FieldShape::Text),
    field("discovered_by", FieldShape::Text),
    field("implicates", FieldShape::Text),
    field("veracity", FieldShape::Enum(CLUE_VERACITY)),
];

const CLUES_FIELDS: &[FieldSpec] = &[field("clues", FieldShape::ObjectList(CLUE_FIELDS))];

const SCENE_FIELDS: &[FieldSpec] = &[
    field("number", FieldShape::Number),
    field("title", FieldShape::Text),
    field("summary", FieldShape::Text),
    field("characters", FieldShape::TextList),
    field("clue_refs", FieldShape::TextList),
];

const ACT_FIELDS: &[FieldSpec] = &[
    field("number", FieldShape::Number),
    field("title", FieldShape::Text),
    field("scenes", FieldShape::ObjectList(SCENE_FIELDS)),
];

const OUTLINE_FIELDS: &[FieldSpec] = &[field("acts", FieldShape::ObjectList(ACT_FIELDS))];

const CHAPTER_FIELDS: &[FieldSpec] = &[
    field("number", FieldShape::Number),
    field("title", FieldShape::Text),
    field("paragraphs", FieldShape::TextList),
];

const PROSE_FIELDS: &[FieldSpec] = &[field("chapters", FieldShape::ObjectList(CHAPTER_FIELDS))];

/// Returns the declared required-field set for an artifact kind.
#[must_use]
pub fn schema_for(kind: ArtifactKind) -> &'static [FieldSpec] {
    match kind {
        ArtifactKind::Setting => SETTING_FIELDS,
        ArtifactKind::Background => BACKGROUND_FIELDS,
        ArtifactKind::Cast => CAST_FIELDS,
        ArtifactKind::HardLogicDevices => HARD_LOGIC_FIELDS,
        ArtifactKind::CaseModel => CASE_MODEL_FIELDS,
        ArtifactKind::CharacterProfiles => CHARACTER_PROFILES_FIELDS,
        ArtifactKind::LocationProfiles => LOCATION_PROFILES_FIELDS,
        ArtifactKind::Clues => CLUES_FIELDS,
        ArtifactKind::Outline => OUTLINE_FIELDS,
        ArtifactKind::Prose => PROSE_FIELDS,
    }
}

/// Walks an artifact against its declared schema.
///
/// Returns the full error list and the number of checks run.
#[must_use]
pub fn check_schema(kind: ArtifactKind, content: &Value) -> (Vec<ValidationError>, usize) {
    let mut errors = Vec::new();
    let mut checks = 0;
    walk_fields(schema_for(kind), content, "", &mut errors, &mut checks);
    (errors, checks)
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn walk_fields(
    specs: &[FieldSpec],
    value: &Value,
    prefix: &str,
    errors: &mut Vec<ValidationError>,
    checks: &mut usize,
) {
    let Some(object) = value.as_object() else {
        *checks += 1;
        let path = if prefix.is_empty() { "$" } else { prefix };
        errors.push(ValidationError::type_mismatch(path, "object", type_name(value)));
        return;
    };

    for spec in specs {
        *checks += 1;
        let path = join_path(prefix, spec.name);
        match object.get(spec.name) {
            None | Some(Value::Null) => errors.push(ValidationError::missing_field(path)),
            Some(child) => check_shape(&spec.shape, child, &path, errors, checks),
        }
    }
}

fn check_shape(
    shape: &FieldShape,
    value: &Value,
    path: &str,
    errors: &mut Vec<ValidationError>,
    checks: &mut usize,
) {
    match shape {
        FieldShape::Text => match value.as_str() {
            Some(s) if !s.trim().is_empty() => {}
            Some(_) => errors.push(ValidationError::missing_field(path)),
            None => {
                errors.push(ValidationError::type_mismatch(path, "string", type_name(value)));
            }
        },
        FieldShape::Number => {
            if !value.is_number() {
                errors.push(ValidationError::type_mismatch(path, "number", type_name(value)));
            }
        }
        FieldShape::TextList => match value.as_array() {
            None => {
                errors.push(ValidationError::type_mismatch(
                    path,
                    "list of strings",
                    type_name(value),
                ));
            }
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        errors.push(ValidationError::type_mismatch(
                            format!("{path}[{i}]"),
                            "string",
                            type_name(item),
                        ));
                    }
                }
            }
        },
        FieldShape::Enum(allowed) => match value.as_str() {
            None => {
                errors.push(ValidationError::type_mismatch(path, "string", type_name(value)));
            }
            Some(s) => {
                if !allowed.contains(&s) {
                    errors.push(ValidationError::invalid_enum(path, s, allowed));
                }
            }
        },
        FieldShape::Object(fields) => {
            walk_fields(fields, value, path, errors, checks);
        }
        FieldShape::ObjectList(fields) => match value.as_array() {
            None => {
                errors.push(ValidationError::type_mismatch(
                    path,
                    "list of objects",
                    type_name(value),
                ));
            }
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    walk_fields(fields, item, &format!("{path}[{i}]"), errors, checks);
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::error::ErrorCategory;
    use serde_json::json;

    #[test]
    fn test_valid_setting_passes() {
        let content = json!({
            "era": "1923",
            "region": "Cornwall",
            "locale": "Trewithen Hall",
            "description": "A granite manor above the sea."
        });
        let (errors, checks) = check_schema(ArtifactKind::Setting, &content);
        assert!(errors.is_empty());
        assert_eq!(checks, 4);
    }

    #[test]
    fn test_missing_fields_reported_individually() {
        let content = json!({"era": "1923"});
        let (errors, _) = check_schema(ArtifactKind::Setting, &content);
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.category == ErrorCategory::MissingField));
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let content = json!({
            "era": "  ",
            "region": "Cornwall",
            "locale": "Trewithen Hall",
            "description": "x"
        });
        let (errors, _) = check_schema(ArtifactKind::Setting, &content);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "era");
        assert_eq!(errors[0].category, ErrorCategory::MissingField);
    }

    #[test]
    fn test_type_mismatch_list_vs_scalar() {
        let content = json!({
            "summary": "x",
            "history": "not a list",
            "tensions": ["a"]
        });
        let (errors, _) = check_schema(ArtifactKind::Background, &content);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::TypeMismatch);
        assert_eq!(errors[0].path, "history");
        assert!(errors[0].message.contains("list of strings"));
    }

    #[test]
    fn test_enum_violation_in_list_element() {
        let content = json!({
            "members": [
                {"name": "A", "role": "detective", "motive": "m", "alibi": "a"},
                {"name": "B", "role": "butler", "motive": "m", "alibi": "a"}
            ]
        });
        let (errors, _) = check_schema(ArtifactKind::Cast, &content);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::InvalidEnumValue);
        assert_eq!(errors[0].path, "members[1].role");
    }

    #[test]
    fn test_nested_object_paths() {
        let content = json!({
            "crime": {"kind": "murder", "victim": "V", "scene": "study"},
            "culprit": "C",
            "deduction_chain": [],
            "discriminating_test": {"description": "d", "excludes": []},
            "red_herrings": []
        });
        let (errors, _) = check_schema(ArtifactKind::CaseModel, &content);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "crime.time");
    }

    #[test]
    fn test_non_object_root() {
        let (errors, checks) = check_schema(ArtifactKind::Setting, &json!([1, 2]));
        assert_eq!(errors.len(), 1);
        assert_eq!(checks, 1);
        assert_eq!(errors[0].category, ErrorCategory::TypeMismatch);
    }

    #[test]
    fn test_every_kind_has_a_schema() {
        for kind in [
            ArtifactKind::Setting,
            ArtifactKind::Background,
            ArtifactKind::Cast,
            ArtifactKind::HardLogicDevices,
            ArtifactKind::CaseModel,
            ArtifactKind::CharacterProfiles,
            ArtifactKind::LocationProfiles,
            ArtifactKind::Clues,
            ArtifactKind::Outline,
            ArtifactKind::Prose,
        ] {
            assert!(!schema_for(kind).is_empty(), "kind {kind}");
        }
    }
}
