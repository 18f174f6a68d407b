//! Per-field extractors
//!
//! A field can arrive as a raw foreign key (`status: 7`), as an embedded
//! object (`status: {id: 7, name: "New"}`), or next to a denormalized sibling
//! (`status_extra_info: {name: "New"}`, `milestone_name: "Sprint 1"`). Each
//! shape is handled by one extractor; extractors are tried in order, siblings
//! first and cache lookup last.

use serde_json::Value;

use super::NameLookup;
use crate::model::LookupKind;

/// Field to extract, and the lookup collection its raw id refers to
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: &'static str,
    pub lookup: Option<LookupKind>,
}

impl FieldSpec {
    pub const fn new(field: &'static str, lookup: Option<LookupKind>) -> Self {
        Self { field, lookup }
    }
}

type NameExtractor = fn(&Value, &FieldSpec, &dyn NameLookup) -> Option<String>;
type UserExtractor = fn(&Value, &str, &dyn NameLookup) -> Option<String>;

const NAME_EXTRACTORS: &[NameExtractor] = &[
    name_from_extra_info,
    name_from_sibling,
    name_from_embedded,
    name_from_lookup,
];

const USER_EXTRACTORS: &[UserExtractor] = &[
    username_from_extra_info,
    username_from_embedded,
    username_from_cache,
];

fn extra_info<'a>(raw: &'a Value, field: &str) -> Option<&'a Value> {
    raw.get(format!("{}_extra_info", field))
        .filter(|v| v.is_object())
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Raw foreign key of `field`, whichever shape carries it
pub fn raw_id(raw: &Value, field: &str) -> Option<i64> {
    let direct = raw.get(field);
    direct
        .and_then(Value::as_i64)
        .or_else(|| direct.and_then(|v| v.get("id")).and_then(Value::as_i64))
        .or_else(|| {
            extra_info(raw, field)
                .and_then(|info| info.get("id"))
                .and_then(Value::as_i64)
        })
}

fn name_from_extra_info(raw: &Value, spec: &FieldSpec, _: &dyn NameLookup) -> Option<String> {
    non_empty(extra_info(raw, spec.field).and_then(|info| info.get("name")))
}

fn name_from_sibling(raw: &Value, spec: &FieldSpec, _: &dyn NameLookup) -> Option<String> {
    non_empty(raw.get(format!("{}_name", spec.field)))
}

fn name_from_embedded(raw: &Value, spec: &FieldSpec, _: &dyn NameLookup) -> Option<String> {
    non_empty(raw.get(spec.field).and_then(|v| v.get("name")))
}

fn name_from_lookup(raw: &Value, spec: &FieldSpec, names: &dyn NameLookup) -> Option<String> {
    let kind = spec.lookup?;
    let id = raw_id(raw, spec.field)?;
    names.lookup(kind, id).map(|entry| entry.name)
}

/// Display name of a lookup-valued field
pub fn display_name(raw: &Value, spec: &FieldSpec, names: &dyn NameLookup) -> Option<String> {
    NAME_EXTRACTORS
        .iter()
        .find_map(|extract| extract(raw, spec, names))
}

fn username_from_extra_info(raw: &Value, field: &str, _: &dyn NameLookup) -> Option<String> {
    let info = extra_info(raw, field)?;
    non_empty(info.get("username")).or_else(|| non_empty(info.get("full_name_display")))
}

fn username_from_embedded(raw: &Value, field: &str, _: &dyn NameLookup) -> Option<String> {
    non_empty(raw.get(field).and_then(|v| v.get("username")))
}

fn username_from_cache(raw: &Value, field: &str, names: &dyn NameLookup) -> Option<String> {
    let id = raw_id(raw, field)?;
    names.user(id).map(|user| user.username)
}

/// Username behind a user-valued field
pub fn user_display(raw: &Value, field: &str, names: &dyn NameLookup) -> Option<String> {
    USER_EXTRACTORS
        .iter()
        .find_map(|extract| extract(raw, field, names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::fixtures::StaticLookup;
    use crate::normalize::NoLookup;
    use serde_json::json;

    const STATUS: FieldSpec = FieldSpec::new("status", Some(LookupKind::StoryStatus));

    #[test]
    fn test_raw_id_shapes() {
        assert_eq!(raw_id(&json!({"status": 7}), "status"), Some(7));
        assert_eq!(raw_id(&json!({"status": {"id": 8}}), "status"), Some(8));
        assert_eq!(
            raw_id(&json!({"status": null, "status_extra_info": {"id": 9}}), "status"),
            Some(9)
        );
        assert_eq!(raw_id(&json!({}), "status"), None);
    }

    #[test]
    fn test_sibling_preferred_over_cache() {
        let names = StaticLookup::default().with(LookupKind::StoryStatus, 7, "From cache");
        let raw = json!({"status": 7, "status_extra_info": {"name": "From sibling"}});
        assert_eq!(display_name(&raw, &STATUS, &names).as_deref(), Some("From sibling"));

        let raw = json!({"status": 7});
        assert_eq!(display_name(&raw, &STATUS, &names).as_deref(), Some("From cache"));
        assert_eq!(display_name(&raw, &STATUS, &NoLookup), None);
    }

    #[test]
    fn test_name_sibling_and_embedded() {
        let sprint = FieldSpec::new("milestone", None);
        let raw = json!({"milestone": 3, "milestone_name": "Sprint 1"});
        assert_eq!(display_name(&raw, &sprint, &NoLookup).as_deref(), Some("Sprint 1"));

        let raw = json!({"status": {"id": 2, "name": "Embedded"}});
        assert_eq!(display_name(&raw, &STATUS, &NoLookup).as_deref(), Some("Embedded"));

        let raw = json!({"status": 7, "status_extra_info": {"name": "  "}});
        assert_eq!(display_name(&raw, &STATUS, &NoLookup), None);
    }

    #[test]
    fn test_user_display() {
        let names = StaticLookup::default().with_user(5, "alice");
        let raw = json!({"assigned_to": 5, "assigned_to_extra_info": {"username": "al"}});
        assert_eq!(user_display(&raw, "assigned_to", &names).as_deref(), Some("al"));

        let raw = json!({"assigned_to": 5});
        assert_eq!(user_display(&raw, "assigned_to", &names).as_deref(), Some("alice"));

        let raw = json!({"assigned_to": null});
        assert_eq!(user_display(&raw, "assigned_to", &names), None);
    }
}
