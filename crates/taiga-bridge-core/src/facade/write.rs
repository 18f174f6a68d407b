//! Write preparation
//!
//! Turns a caller-supplied create/update body into the exact body sent to the
//! backend. Every token is resolved here, before any write goes out, so a
//! single unresolvable field fails the whole operation.

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::Facade;
use crate::model::{EntityKind, LookupKind, Token};
use crate::normalize::{date_only, parse_date, sanitize, tags_for_write};
use crate::resolver::points_body;
use crate::{BridgeError, Result};

/// Epic resolved from a caller-supplied ref
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EpicTarget {
    pub id: i64,
    pub reference: i64,
}

/// Backend body plus the secondary steps that follow the primary write
#[derive(Debug, Default)]
pub(crate) struct WritePlan {
    pub body: Map<String, Value>,
    pub comment: Option<String>,
    /// Desired epic set of a story; `None` leaves links untouched
    pub epics: Option<Vec<EpicTarget>>,
}

impl WritePlan {
    /// Whether the body changes anything beyond the version stamp
    pub fn has_changes(&self) -> bool {
        self.body.keys().any(|key| key != "version")
    }
}

fn take_comment(body: &mut Map<String, Value>) -> Result<Option<String>> {
    match body.remove("comment") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(other) => Err(BridgeError::InvalidInput(format!(
            "comment must be text, got {}",
            other
        ))),
    }
}

/// Refs from an `epics` field: integers, numeric strings, or `{ref}` objects
pub(crate) fn parse_refs(value: &Value) -> Result<Vec<i64>> {
    let invalid = || BridgeError::InvalidInput(format!("expected a list of refs, got {}", value));
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => return Err(invalid()),
    };
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
            Value::Object(_) => item.get("ref").and_then(Value::as_i64),
            _ => None,
        })
        .collect::<Option<Vec<i64>>>()
        .ok_or_else(invalid)
}

fn ref_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
        _ => None,
    }
}

impl Facade {
    /// Resolve epic refs against one listing of the project's epics
    pub(crate) async fn resolve_epic_targets(&self, refs: &[i64]) -> Result<Vec<EpicTarget>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        let by_ref: HashMap<i64, i64> = self
            .resolver
            .list_raw(EntityKind::Epic)
            .await?
            .iter()
            .filter_map(|epic| {
                Some((
                    epic.get("ref").and_then(Value::as_i64)?,
                    epic.get("id").and_then(Value::as_i64)?,
                ))
            })
            .collect();
        let mut targets: Vec<EpicTarget> = Vec::with_capacity(refs.len());
        for &reference in refs {
            let id = by_ref.get(&reference).copied().ok_or(BridgeError::UnknownReference {
                kind: EntityKind::Epic,
                reference,
            })?;
            if !targets.iter().any(|t| t.id == id) {
                targets.push(EpicTarget { id, reference });
            }
        }
        Ok(targets)
    }

    async fn resolve_lookup_field(
        &self,
        body: &mut Map<String, Value>,
        field: &str,
        kind: LookupKind,
    ) -> Result<()> {
        let Some(value) = body.get(field) else {
            return Ok(());
        };
        let token = Token::from_value(value).ok_or_else(|| {
            BridgeError::InvalidInput(format!("{} must be a name or an id, got {}", field, value))
        })?;
        let id = self.resolver.resolve_lookup_name(kind, &token).await?;
        body.insert(field.to_string(), Value::from(id));
        Ok(())
    }

    async fn resolve_user_field(&self, body: &mut Map<String, Value>, field: &str) -> Result<()> {
        let token = match body.get(field) {
            None | Some(Value::Null) => return Ok(()),
            Some(value) => Token::from_value(value).ok_or_else(|| {
                BridgeError::InvalidInput(format!("{} must be a username or an id", field))
            })?,
        };
        let id = self.resolver.resolve_user_id(&token).await?;
        body.insert(field.to_string(), Value::from(id));
        Ok(())
    }

    async fn resolve_user_list(&self, body: &mut Map<String, Value>, field: &str) -> Result<()> {
        let items = match body.get(field) {
            None => return Ok(()),
            Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                return Err(BridgeError::InvalidInput(format!(
                    "{} must be a list of users, got {}",
                    field, other
                )))
            }
        };
        let mut ids = Vec::with_capacity(items.len());
        for item in &items {
            let token = Token::from_value(item).ok_or_else(|| {
                BridgeError::InvalidInput(format!("{} entries must be usernames or ids", field))
            })?;
            ids.push(Value::from(self.resolver.resolve_user_id(&token).await?));
        }
        body.insert(field.to_string(), Value::Array(ids));
        Ok(())
    }

    /// Build the backend body for a create or update of `kind`
    pub(crate) async fn prepare_write(
        &self,
        kind: EntityKind,
        mut body: Map<String, Value>,
    ) -> Result<WritePlan> {
        let comment = take_comment(&mut body)?;

        let epic_refs = match body.remove("epics") {
            None => None,
            Some(_) if kind != EntityKind::Story => {
                return Err(BridgeError::InvalidInput(
                    "only user stories are linked to epics".into(),
                ))
            }
            Some(value) => Some(parse_refs(&value)?),
        };

        // `sprint` is accepted as an alias of the backend's `milestone`
        let sprint_input = match body.remove("sprint") {
            Some(value) => {
                body.remove("milestone");
                Some(value)
            }
            None => body.remove("milestone"),
        };
        if sprint_input.is_some() && kind == EntityKind::Epic {
            return Err(BridgeError::InvalidInput("epics are not planned in sprints".into()));
        }

        let removed = sanitize(&mut body);
        if !removed.is_empty() {
            tracing::debug!("Dropped read-only fields from {} write: {:?}", kind, removed);
        }

        if let Some(status) = kind.status_lookup() {
            self.resolve_lookup_field(&mut body, "status", status).await?;
        }
        if kind == EntityKind::Issue {
            self.resolve_lookup_field(&mut body, "severity", LookupKind::Severity).await?;
            self.resolve_lookup_field(&mut body, "priority", LookupKind::Priority).await?;
            self.resolve_lookup_field(&mut body, "type", LookupKind::IssueType).await?;
        }
        self.resolve_user_field(&mut body, "assigned_to").await?;
        self.resolve_user_list(&mut body, "watchers").await?;
        if kind == EntityKind::Story {
            self.resolve_user_list(&mut body, "assigned_users").await?;
            if let Some(points) = body.get("points") {
                let points = points.as_object().ok_or_else(|| {
                    BridgeError::InvalidInput("points must map roles to point labels".into())
                })?;
                let resolved = self.resolver.resolve_role_points(points).await?;
                body.insert("points".into(), points_body(&resolved));
            }
        }
        if kind == EntityKind::Task {
            match body.get("user_story") {
                None | Some(Value::Null) => {}
                Some(value) => {
                    let reference = ref_of(value).ok_or_else(|| {
                        BridgeError::InvalidInput(format!("user_story must be a story ref, got {}", value))
                    })?;
                    let id = self
                        .resolver
                        .require_id_by_ref(EntityKind::Story, reference)
                        .await?;
                    body.insert("user_story".into(), Value::from(id));
                }
            }
        }
        if let Some(tags) = body.get("tags") {
            let tags = tags_for_write(tags)?;
            body.insert("tags".into(), tags);
        }
        if let Some(due) = body.get("due_date").filter(|v| !v.is_null()) {
            let valid = due.as_str().and_then(parse_date).is_some();
            if !valid {
                return Err(BridgeError::InvalidInput(format!("due_date is not a date: {}", due)));
            }
            let day = date_only(Some(due));
            body.insert("due_date".into(), day.map(Value::from).unwrap_or(Value::Null));
        }

        let sprint = self
            .resolver
            .resolve_sprint_input(sprint_input.as_ref())
            .await?;
        if let Some(milestone) = sprint.as_write_value() {
            body.insert("milestone".into(), milestone);
        }

        let epics = match epic_refs {
            Some(refs) => Some(self.resolve_epic_targets(&refs).await?),
            None => None,
        };

        Ok(WritePlan {
            body,
            comment,
            epics,
        })
    }
}
