//! Tag encoding
//!
//! The backend stores tags as `[name, colorOrNull]` pairs; views expose plain
//! deduplicated names.

use serde_json::{json, Value};

use crate::{BridgeError, Result};

fn tag_name(item: &Value) -> Option<&str> {
    let name = match item {
        Value::String(s) => s.as_str(),
        Value::Array(pair) => pair.first()?.as_str()?,
        _ => return None,
    };
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// Flatten pair or bare-string tags into unique non-empty names
pub fn decode_tags(value: Option<&Value>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let Some(Value::Array(items)) = value else {
        return names;
    };
    for name in items.iter().filter_map(tag_name) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Pair form with no color
pub fn encode_tags<S: AsRef<str>>(names: &[S]) -> Value {
    Value::Array(
        names
            .iter()
            .map(|name| json!([name.as_ref(), null]))
            .collect(),
    )
}

/// Caller-supplied tags in pair form.
///
/// Accepts names, `[name, color]` pairs, or one comma-separated string;
/// keeps a color when the caller gave one.
pub fn tags_for_write(value: &Value) -> Result<Value> {
    let items: Vec<Value> = match value {
        Value::Null => Vec::new(),
        Value::String(s) => s.split(',').map(|t| Value::String(t.to_string())).collect(),
        Value::Array(items) => items.clone(),
        other => {
            return Err(BridgeError::InvalidInput(format!(
                "tags must be a list of names, got {}",
                other
            )))
        }
    };

    let mut pairs: Vec<Value> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for item in &items {
        let name = match tag_name(item) {
            Some(name) => name,
            None if matches!(item, Value::String(_)) => continue,
            None => {
                return Err(BridgeError::InvalidInput(format!("invalid tag: {}", item)));
            }
        };
        if seen.iter().any(|s| s == name) {
            continue;
        }
        let color = match item {
            Value::Array(pair) => pair.get(1).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        };
        seen.push(name.to_string());
        pairs.push(json!([name, color]));
    }
    Ok(Value::Array(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_trip() {
        let encoded = encode_tags(&["a", "b"]);
        assert_eq!(encoded, json!([["a", null], ["b", null]]));
        assert_eq!(decode_tags(Some(&encoded)), vec!["a", "b"]);
    }

    #[test]
    fn test_decode_mixed_shapes() {
        let raw = json!([["ux", "#ff0000"], "api", ["ux", null], "", ["  "], 7]);
        assert_eq!(decode_tags(Some(&raw)), vec!["ux", "api"]);
        assert!(decode_tags(Some(&json!(null))).is_empty());
        assert!(decode_tags(None).is_empty());
    }

    #[test]
    fn test_tags_for_write() {
        assert_eq!(
            tags_for_write(&json!(["a", ["b", "#123456"], "a"])).unwrap(),
            json!([["a", null], ["b", "#123456"]])
        );
        assert_eq!(
            tags_for_write(&json!("x, y,,")).unwrap(),
            json!([["x", null], ["y", null]])
        );
        assert_eq!(tags_for_write(&json!(null)).unwrap(), json!([]));
        assert!(tags_for_write(&json!(5)).is_err());
        assert!(tags_for_write(&json!([{"name": "x"}])).is_err());
    }

    proptest! {
        #[test]
        fn prop_encode_then_decode(names in proptest::collection::vec("[a-z]{1,8}", 0..8)) {
            let mut unique: Vec<String> = Vec::new();
            for name in &names {
                if !unique.contains(name) {
                    unique.push(name.clone());
                }
            }
            let decoded = decode_tags(Some(&encode_tags(&names)));
            prop_assert_eq!(decoded, unique);
        }
    }
}
