//! Canonical JSON rendering and content fingerprints.
//!
//! The revision engine freezes the parts of an artifact that carried no
//! errors and verifies after repair that those parts are byte-identical.
//! That comparison runs over a canonical rendering (recursively sorted
//! object keys) hashed with SHA-256.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Renders a JSON value with recursively sorted object keys and no
/// insignificant whitespace.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(child) = map.get(*key) {
                    write_canonical(child, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Returns the hex SHA-256 fingerprint of a value's canonical rendering.
#[must_use]
pub fn fingerprint(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolves a dotted path with optional list indices against a JSON value.
///
/// Paths look like `members[2].role` or `crime.kind`. Returns `None` when
/// any segment is absent.
#[must_use]
pub fn value_at_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        let (name, indices) = split_indices(segment);
        if !name.is_empty() {
            current = current.get(name)?;
        }
        for idx in indices {
            current = current.get(idx)?;
        }
    }
    Some(current)
}

/// Splits a path segment into its field name and trailing list indices.
fn split_indices(segment: &str) -> (&str, Vec<usize>) {
    match segment.find('[') {
        None => (segment, Vec::new()),
        Some(pos) => {
            let name = &segment[..pos];
            let indices = segment[pos..]
                .split(['[', ']'])
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
            (name, indices)
        }
    }
}
