//! List filters
//!
//! Filters are resolved to ids up front and then applied client-side over the
//! full project listing, so their meaning does not depend on which query
//! parameters a given backend version honours.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::Facade;
use crate::model::{EntityKind, LookupKind, SprintView, Token, WorkItemView};
use crate::normalize::{parse_date, raw_id};
use crate::resolver::SprintSelection;
use crate::{BridgeError, Result};

/// Date fields a range filter may target
pub const DATE_FIELDS: &[&str] = &["created_date", "modified_date", "finished_date", "due_date"];

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<Token>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Token),
        Many(Vec<Token>),
    }
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(token)) => vec![token],
        Some(OneOrMany::Many(tokens)) => tokens,
    })
}

/// Keeps an explicit `null` distinct from an absent field
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Filter for epic/story/task/issue listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilter {
    /// Field the date range applies to; `created_date` when unset
    pub date_field: Option<String>,
    /// Inclusive lower bound
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound
    pub to: Option<NaiveDate>,
    #[serde(deserialize_with = "one_or_many")]
    pub status: Vec<Token>,
    #[serde(deserialize_with = "one_or_many")]
    pub severity: Vec<Token>,
    #[serde(deserialize_with = "one_or_many")]
    pub priority: Vec<Token>,
    #[serde(rename = "type", deserialize_with = "one_or_many")]
    pub issue_type: Vec<Token>,
    pub assigned_to: Option<Token>,
    /// Sprint name or id; `null` or a backlog synonym selects unscheduled items
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sprint: Option<Value>,
    /// Epic ref; user stories only
    pub epic: Option<i64>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: impl Into<Token>) -> Self {
        self.status.push(status.into());
        self
    }

    pub fn with_assignee(mut self, user: impl Into<Token>) -> Self {
        self.assigned_to = Some(user.into());
        self
    }

    pub fn with_sprint(mut self, sprint: Value) -> Self {
        self.sprint = Some(sprint);
        self
    }

    pub fn with_epic(mut self, epic_ref: i64) -> Self {
        self.epic = Some(epic_ref);
        self
    }

    pub fn with_date_range(
        mut self,
        field: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Self {
        self.date_field = Some(field.to_string());
        self.from = from;
        self.to = to;
        self
    }
}

/// Filter for sprint listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SprintFilter {
    /// Sprints finishing on or after this day
    pub from: Option<NaiveDate>,
    /// Sprints starting on or before this day
    pub to: Option<NaiveDate>,
    pub closed: Option<bool>,
}

impl SprintFilter {
    /// Overlap of the sprint's estimated span with `[from, to]`
    pub fn matches(&self, sprint: &SprintView) -> bool {
        if let Some(closed) = self.closed {
            if sprint.closed != closed {
                return false;
            }
        }
        let start = sprint.estimated_start.as_deref().and_then(parse_date);
        let finish = sprint.estimated_finish.as_deref().and_then(parse_date);
        if let Some(from) = self.from {
            match finish.or(start) {
                Some(day) if day >= from => {}
                _ => return false,
            }
        }
        if let Some(to) = self.to {
            match start.or(finish) {
                Some(day) if day <= to => {}
                _ => return false,
            }
        }
        true
    }
}

/// [`ListFilter`] with every token resolved to ids
#[derive(Debug, Default)]
pub(crate) struct ResolvedFilter {
    date_field: String,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    status: Option<HashSet<i64>>,
    severity: Option<HashSet<i64>>,
    priority: Option<HashSet<i64>>,
    issue_type: Option<HashSet<i64>>,
    assigned_to: Option<i64>,
    sprint: Option<SprintSelection>,
    story_ids: Option<HashSet<i64>>,
}

fn in_set(set: &Option<HashSet<i64>>, raw: &Value, field: &str) -> bool {
    match set {
        None => true,
        Some(ids) => raw_id(raw, field).map_or(false, |id| ids.contains(&id)),
    }
}

impl ResolvedFilter {
    pub(crate) fn matches(&self, raw: &Value) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let day = raw
                .get(&self.date_field)
                .and_then(Value::as_str)
                .and_then(parse_date);
            let Some(day) = day else {
                return false;
            };
            if self.from.map_or(false, |from| day < from) || self.to.map_or(false, |to| day > to) {
                return false;
            }
        }
        if !(in_set(&self.status, raw, "status")
            && in_set(&self.severity, raw, "severity")
            && in_set(&self.priority, raw, "priority")
            && in_set(&self.issue_type, raw, "type"))
        {
            return false;
        }
        if let Some(user) = self.assigned_to {
            let assigned = raw_id(raw, "assigned_to") == Some(user)
                || raw
                    .get("assigned_users")
                    .and_then(Value::as_array)
                    .map_or(false, |ids| ids.iter().any(|id| id.as_i64() == Some(user)));
            if !assigned {
                return false;
            }
        }
        match self.sprint {
            None | Some(SprintSelection::Unspecified) => {}
            Some(SprintSelection::Clear) => {
                if raw_id(raw, "milestone").is_some() {
                    return false;
                }
            }
            Some(SprintSelection::Assign(id)) => {
                if raw_id(raw, "milestone") != Some(id) {
                    return false;
                }
            }
        }
        if let Some(ids) = &self.story_ids {
            let id = raw.get("id").and_then(Value::as_i64);
            if !id.map_or(false, |id| ids.contains(&id)) {
                return false;
            }
        }
        true
    }
}

/// Open before closed, then by ref
pub(crate) fn sort_views(views: &mut [WorkItemView]) {
    views.sort_by_key(|view| (view.is_closed, view.reference));
}

impl Facade {
    async fn resolve_set(&self, kind: LookupKind, tokens: &[Token]) -> Result<Option<HashSet<i64>>> {
        if tokens.is_empty() {
            return Ok(None);
        }
        let mut ids = HashSet::new();
        for token in tokens {
            ids.insert(self.resolver.resolve_lookup_name(kind, token).await?);
        }
        Ok(Some(ids))
    }

    pub(crate) async fn resolve_filter(&self, kind: EntityKind, filter: &ListFilter) -> Result<ResolvedFilter> {
        let date_field = filter
            .date_field
            .clone()
            .unwrap_or_else(|| "created_date".to_string());
        if !DATE_FIELDS.contains(&date_field.as_str()) {
            return Err(BridgeError::InvalidInput(format!(
                "cannot filter on {:?}; expected one of {}",
                date_field,
                DATE_FIELDS.join(", ")
            )));
        }
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(BridgeError::InvalidInput(format!(
                    "empty date range {} .. {}",
                    from, to
                )));
            }
        }

        let issue_only = !filter.severity.is_empty()
            || !filter.priority.is_empty()
            || !filter.issue_type.is_empty();
        if issue_only && kind != EntityKind::Issue {
            return Err(BridgeError::InvalidInput(format!(
                "severity, priority and type filters apply to issues, not {}s",
                kind
            )));
        }
        if filter.epic.is_some() && kind != EntityKind::Story {
            return Err(BridgeError::InvalidInput(
                "epic membership filters apply to user stories only".into(),
            ));
        }
        if filter.sprint.is_some() && kind == EntityKind::Epic {
            return Err(BridgeError::InvalidInput("epics are not planned in sprints".into()));
        }

        let status = match kind.status_lookup() {
            Some(lookup) => self.resolve_set(lookup, &filter.status).await?,
            None => None,
        };
        let assigned_to = match &filter.assigned_to {
            Some(token) => Some(self.resolver.resolve_user_id(token).await?),
            None => None,
        };
        let sprint = match &filter.sprint {
            Some(value) => Some(self.resolver.resolve_sprint_input(Some(value)).await?),
            None => None,
        };
        let story_ids = match filter.epic {
            Some(epic_ref) => {
                let epic_id = self
                    .resolver
                    .require_id_by_ref(EntityKind::Epic, epic_ref)
                    .await?;
                Some(self.related_story_ids(epic_id).await?.into_iter().collect())
            }
            None => None,
        };

        Ok(ResolvedFilter {
            date_field,
            from: filter.from,
            to: filter.to,
            status,
            severity: self.resolve_set(LookupKind::Severity, &filter.severity).await?,
            priority: self.resolve_set(LookupKind::Priority, &filter.priority).await?,
            issue_type: self.resolve_set(LookupKind::IssueType, &filter.issue_type).await?,
            assigned_to,
            sprint,
            story_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_deserialize_filter() {
        let filter: ListFilter = serde_json::from_value(json!({
            "status": "New",
            "type": ["Bug", 72],
            "sprint": null,
            "from": "2024-01-01"
        }))
        .unwrap();
        assert_eq!(filter.status, vec![Token::Name("New".into())]);
        assert_eq!(filter.issue_type, vec![Token::Name("Bug".into()), Token::Id(72)]);
        assert_eq!(filter.sprint, Some(Value::Null));
        assert_eq!(filter.from, Some(date("2024-01-01")));

        let empty: ListFilter = serde_json::from_value(json!({})).unwrap();
        assert!(empty.sprint.is_none());
        assert!(empty.status.is_empty());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let filter = ResolvedFilter {
            date_field: "due_date".into(),
            from: Some(date("2024-03-01")),
            to: Some(date("2024-03-31")),
            ..Default::default()
        };
        assert!(filter.matches(&json!({"due_date": "2024-03-01"})));
        assert!(filter.matches(&json!({"due_date": "2024-03-31T23:00:00Z"})));
        assert!(!filter.matches(&json!({"due_date": "2024-04-01"})));
        assert!(!filter.matches(&json!({"due_date": null})));
    }

    #[test]
    fn test_membership_assignee_and_sprint() {
        let filter = ResolvedFilter {
            status: Some(HashSet::from([11, 12])),
            assigned_to: Some(5),
            sprint: Some(SprintSelection::Clear),
            ..Default::default()
        };
        assert!(filter.matches(&json!({"status": 11, "assigned_to": 5, "milestone": null})));
        assert!(filter.matches(&json!({
            "status": {"id": 12}, "assigned_to": null, "assigned_users": [4, 5]
        })));
        assert!(!filter.matches(&json!({"status": 13, "assigned_to": 5})));
        assert!(!filter.matches(&json!({"status": 11, "assigned_to": 5, "milestone": 7})));

        let in_sprint = ResolvedFilter {
            sprint: Some(SprintSelection::Assign(7)),
            ..Default::default()
        };
        assert!(in_sprint.matches(&json!({"milestone": 7})));
        assert!(!in_sprint.matches(&json!({"milestone": null})));
    }

    #[test]
    fn test_sprint_filter_overlap() {
        let sprint = SprintView {
            id: 1,
            name: "S1".into(),
            slug: None,
            estimated_start: Some("2024-01-01".into()),
            estimated_finish: Some("2024-01-14".into()),
            closed: true,
            total_points: None,
            closed_points: None,
            story_refs: vec![],
        };
        let filter = SprintFilter {
            from: Some(date("2024-01-14")),
            to: None,
            closed: None,
        };
        assert!(filter.matches(&sprint));

        let later = SprintFilter {
            from: Some(date("2024-01-15")),
            ..Default::default()
        };
        assert!(!later.matches(&sprint));

        let open_only = SprintFilter {
            closed: Some(false),
            ..Default::default()
        };
        assert!(!open_only.matches(&sprint));
    }
}
