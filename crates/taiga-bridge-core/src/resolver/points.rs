//! Role -> point estimate resolution for stories

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::lookups::find_by_name;
use super::Resolver;
use crate::model::{LookupEntry, LookupKind};
use crate::{BridgeError, Result};

fn match_role(roles: &[LookupEntry], key: &str) -> Option<i64> {
    let key = key.trim();
    if let Ok(id) = key.parse::<i64>() {
        if roles.iter().any(|role| role.id == id) {
            return Some(id);
        }
    }
    let lowered = key.to_lowercase();
    find_by_name(roles, key).map(|role| role.id).or_else(|| {
        roles
            .iter()
            .find(|role| role.slug.as_deref().map_or(false, |slug| slug.to_lowercase() == lowered))
            .map(|role| role.id)
    })
}

/// Canonical label of a numeric estimate: `3.0` reads as `"3"`
fn numeric_label(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn match_point(points: &[LookupEntry], value: &Value) -> Option<i64> {
    match value {
        Value::String(label) => points.iter().find(|p| p.name == *label).map(|p| p.id),
        Value::Number(n) => {
            let n = n.as_f64()?;
            let label = numeric_label(n);
            points
                .iter()
                .find(|p| p.name == label)
                .or_else(|| points.iter().find(|p| p.value == Some(n)))
                .map(|p| p.id)
                .or_else(|| {
                    let id = n as i64;
                    (n.fract() == 0.0 && points.iter().any(|p| p.id == id)).then_some(id)
                })
        }
        _ => None,
    }
}

impl Resolver {
    /// Resolve `{role: point}` labels into `{role id: point id}`.
    ///
    /// Roles match an existing id, or a name or slug case-insensitively.
    /// Point labels match exactly, including symbolic ones such as `"?"`.
    /// Any unresolved entry fails the whole map.
    pub async fn resolve_role_points(&self, input: &Map<String, Value>) -> Result<BTreeMap<i64, i64>> {
        let roles = self.lookup_entries(LookupKind::Role).await;
        let points = self.lookup_entries(LookupKind::Point).await;

        let mut resolved = BTreeMap::new();
        for (role_key, point_value) in input {
            let role_id = match_role(&roles, role_key).ok_or_else(|| BridgeError::UnknownLookupValue {
                kind: LookupKind::Role,
                value: role_key.clone(),
            })?;
            let point_id = match_point(&points, point_value).ok_or_else(|| {
                BridgeError::UnknownLookupValue {
                    kind: LookupKind::Point,
                    value: match point_value {
                        Value::String(s) => format!("{} (role {})", s, role_key),
                        other => format!("{} (role {})", other, role_key),
                    },
                }
            })?;
            resolved.insert(role_id, point_id);
        }
        Ok(resolved)
    }
}

/// Backend shape of a resolved points map: string role keys
pub fn points_body(points: &BTreeMap<i64, i64>) -> Value {
    Value::Object(
        points
            .iter()
            .map(|(role, point)| (role.to_string(), Value::from(*point)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_symbolic_label() {
        let (_transport, resolver) = fixtures::resolver();
        let resolved = resolver
            .resolve_role_points(&map(json!({"Design": "?"})))
            .await
            .unwrap();
        assert_eq!(resolved, BTreeMap::from([(3, 99)]));
        assert_eq!(points_body(&resolved), json!({"3": 99}));
    }

    #[tokio::test]
    async fn test_ids_slugs_and_numbers() {
        let (_transport, resolver) = fixtures::resolver();
        let resolved = resolver
            .resolve_role_points(&map(json!({"4": 3, "DESIGN": "3"})))
            .await
            .unwrap();
        assert_eq!(resolved, BTreeMap::from([(3, 100), (4, 100)]));

        let resolved = resolver
            .resolve_role_points(&map(json!({"back": 99})))
            .await
            .unwrap();
        assert_eq!(resolved, BTreeMap::from([(4, 99)]));
    }

    #[tokio::test]
    async fn test_unknown_role_fails_whole_map() {
        let (_transport, resolver) = fixtures::resolver();
        let err = resolver
            .resolve_role_points(&map(json!({"Design": "?", "Marketing": "?"})))
            .await
            .unwrap_err();
        match err {
            BridgeError::UnknownLookupValue { kind, value } => {
                assert_eq!(kind, LookupKind::Role);
                assert_eq!(value, "Marketing");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_point_is_named() {
        let (_transport, resolver) = fixtures::resolver();
        let err = resolver
            .resolve_role_points(&map(json!({"Design": "13"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("13"));
        assert!(matches!(
            err,
            BridgeError::UnknownLookupValue { kind: LookupKind::Point, .. }
        ));
    }

    #[test]
    fn test_numeric_label() {
        assert_eq!(numeric_label(3.0), "3");
        assert_eq!(numeric_label(0.5), "0.5");
    }
}
