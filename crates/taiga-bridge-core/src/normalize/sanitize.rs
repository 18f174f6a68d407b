//! Write-body sanitization
//!
//! Computed and read-only fields are stripped from every caller-supplied
//! write body; the backend rejects or ignores writes to them.

use serde_json::{Map, Value};

/// Fields never sent on create/update
pub const READ_ONLY_FIELDS: &[&str] = &[
    "id",
    "ref",
    "project",
    "created_date",
    "modified_date",
    "finished_date",
    "is_closed",
    "total_points",
    "milestone_name",
    "user_stories_counts",
];

const READ_ONLY_SUFFIX: &str = "_extra_info";

pub fn is_read_only(key: &str) -> bool {
    READ_ONLY_FIELDS.contains(&key) || key.ends_with(READ_ONLY_SUFFIX)
}

/// Strip read-only fields in place, returning the removed keys
pub fn sanitize(body: &mut Map<String, Value>) -> Vec<String> {
    let removed: Vec<String> = body.keys().filter(|k| is_read_only(k)).cloned().collect();
    for key in &removed {
        body.remove(key);
    }
    if !removed.is_empty() {
        tracing::debug!("dropped read-only fields from write body: {:?}", removed);
    }
    removed
}

/// Owned variant of [`sanitize`]
pub fn sanitized(mut body: Map<String, Value>) -> Map<String, Value> {
    sanitize(&mut body);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_strips_deny_list() {
        let mut body = object(json!({
            "id": 1, "ref": 2, "project": 3, "subject": "keep",
            "created_date": "x", "modified_date": "x", "finished_date": null,
            "is_closed": true, "total_points": 5.0, "milestone_name": "S1",
            "user_stories_counts": {}, "status_extra_info": {}, "owner_extra_info": {},
            "version": 4, "milestone": 9
        }));
        let mut removed = sanitize(&mut body);
        removed.sort();
        assert_eq!(removed.len(), 12);
        assert_eq!(
            body,
            object(json!({"subject": "keep", "version": 4, "milestone": 9}))
        );
    }

    #[test]
    fn test_view_round_trip_never_reintroduces() {
        let view = json!({
            "id": 10, "ref": 4, "subject": "s", "is_closed": false,
            "created_date": "2024-01-01T00:00:00Z", "tags": ["a"], "version": 3
        });
        let body = sanitized(object(view));
        assert!(body.keys().all(|k| !is_read_only(k)));
        assert_eq!(body, sanitized(body.clone()));
    }

    proptest! {
        #[test]
        fn prop_sanitize_idempotent(
            keys in proptest::collection::vec(
                prop_oneof![
                    Just("id".to_string()),
                    Just("ref".to_string()),
                    Just("is_closed".to_string()),
                    Just("status_extra_info".to_string()),
                    "[a-z_]{1,12}",
                ],
                0..12,
            )
        ) {
            let body: Map<String, Value> = keys
                .into_iter()
                .enumerate()
                .map(|(i, k)| (k, json!(i)))
                .collect();
            let once = sanitized(body);
            let twice = sanitized(once.clone());
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.keys().all(|k| !is_read_only(k)));
        }
    }
}
