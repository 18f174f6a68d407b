//! View construction

use serde_json::Value;

use super::closed::is_closed;
use super::dates::date_only;
use super::extract::{display_name, raw_id, user_display, FieldSpec};
use super::tags::decode_tags;
use super::NameLookup;
use crate::model::{
    EntityKind, EpicLinkView, ItemDetails, LookupKind, ProjectView, RolePointView, SprintView,
    UserSummary, WorkItemView,
};
use crate::{BridgeError, Result};

const SPRINT: FieldSpec = FieldSpec::new("milestone", None);
const SEVERITY: FieldSpec = FieldSpec::new("severity", Some(LookupKind::Severity));
const PRIORITY: FieldSpec = FieldSpec::new("priority", Some(LookupKind::Priority));
const ISSUE_TYPE: FieldSpec = FieldSpec::new("type", Some(LookupKind::IssueType));

fn text(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required_id(raw: &Value, what: &str) -> Result<i64> {
    raw.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| BridgeError::UnexpectedResponse(format!("{} without numeric id", what)))
}

/// Normalized view of an epic, story, task or issue
pub fn work_item_view(kind: EntityKind, raw: &Value, names: &dyn NameLookup) -> Result<WorkItemView> {
    let id = required_id(raw, &kind.to_string())?;
    let reference = raw
        .get("ref")
        .and_then(Value::as_i64)
        .ok_or_else(|| BridgeError::UnexpectedResponse(format!("{} {} without ref", kind, id)))?;

    let status_kind = kind.status_lookup();
    let status_spec = FieldSpec::new("status", status_kind);

    let details = match kind {
        EntityKind::Epic => epic_details(raw),
        EntityKind::Story => story_details(raw, names),
        EntityKind::Task => task_details(raw),
        EntityKind::Issue => ItemDetails::Issue {
            severity: display_name(raw, &SEVERITY, names),
            priority: display_name(raw, &PRIORITY, names),
            issue_type: display_name(raw, &ISSUE_TYPE, names),
        },
        EntityKind::Sprint => {
            return Err(BridgeError::InvalidInput(
                "sprints are normalized with sprint_view".into(),
            ))
        }
    };

    Ok(WorkItemView {
        kind,
        id,
        reference,
        subject: text(raw, "subject").unwrap_or_default(),
        description: text(raw, "description"),
        status: display_name(raw, &status_spec, names),
        status_id: raw_id(raw, "status"),
        is_closed: is_closed(raw, status_kind, names),
        assigned_to: user_display(raw, "assigned_to", names),
        assigned_to_id: raw_id(raw, "assigned_to"),
        owner: user_display(raw, "owner", names),
        tags: decode_tags(raw.get("tags")),
        sprint: display_name(raw, &SPRINT, names),
        sprint_id: raw_id(raw, "milestone"),
        due_date: date_only(raw.get("due_date")),
        created_date: text(raw, "created_date"),
        modified_date: text(raw, "modified_date"),
        version: raw.get("version").and_then(Value::as_i64),
        details,
    })
}

fn epic_details(raw: &Value) -> ItemDetails {
    let counts = raw.get("user_stories_counts");
    let story_count = counts.and_then(|c| {
        c.get("total").and_then(Value::as_i64).or_else(|| {
            let opened = c.get("opened").and_then(Value::as_i64)?;
            let closed = c.get("closed").and_then(Value::as_i64).unwrap_or(0);
            Some(opened + closed)
        })
    });
    ItemDetails::Epic {
        color: text(raw, "color"),
        story_count,
    }
}

fn story_details(raw: &Value, names: &dyn NameLookup) -> ItemDetails {
    let mut points: Vec<RolePointView> = raw
        .get("points")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(role, point)| {
                    let role_id = role.parse::<i64>().ok()?;
                    let point_id = point.as_i64()?;
                    Some(RolePointView {
                        role_id,
                        role: names.lookup(LookupKind::Role, role_id).map(|e| e.name),
                        point_id,
                        point: names.lookup(LookupKind::Point, point_id).map(|e| e.name),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    points.sort_by_key(|p| p.role_id);

    let epics = raw
        .get("epics")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|epic| {
                    Some(EpicLinkView {
                        id: epic.get("id").and_then(Value::as_i64)?,
                        reference: epic.get("ref").and_then(Value::as_i64),
                        subject: text(epic, "subject"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let assigned_users = raw
        .get("assigned_users")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_i64)
                .map(|id| {
                    names
                        .user(id)
                        .map(|u| u.username)
                        .unwrap_or_else(|| id.to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    ItemDetails::Story {
        points,
        total_points: raw.get("total_points").and_then(Value::as_f64),
        epics,
        assigned_users,
    }
}

fn task_details(raw: &Value) -> ItemDetails {
    let user_story_ref = raw
        .get("user_story_extra_info")
        .and_then(|info| info.get("ref"))
        .and_then(Value::as_i64);
    ItemDetails::Task {
        user_story_ref,
        is_blocked: raw
            .get("is_blocked")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

/// Normalized view of a sprint (milestone)
pub fn sprint_view(raw: &Value) -> Result<SprintView> {
    let id = required_id(raw, "sprint")?;
    let story_refs = raw
        .get("user_stories")
        .and_then(Value::as_array)
        .map(|stories| {
            stories
                .iter()
                .filter_map(|s| s.get("ref").and_then(Value::as_i64))
                .collect()
        })
        .unwrap_or_default();
    Ok(SprintView {
        id,
        name: text(raw, "name").unwrap_or_default(),
        slug: text(raw, "slug"),
        estimated_start: date_only(raw.get("estimated_start")),
        estimated_finish: date_only(raw.get("estimated_finish")),
        closed: raw.get("closed").and_then(Value::as_bool).unwrap_or(false),
        total_points: raw.get("total_points").and_then(Value::as_f64),
        closed_points: raw.get("closed_points").and_then(Value::as_f64),
        story_refs,
    })
}

/// Summary of the active project
pub fn project_view(raw: &Value) -> Result<ProjectView> {
    let id = required_id(raw, "project")?;
    let owner = raw
        .get("owner")
        .filter(|o| o.is_object())
        .and_then(UserSummary::from_raw)
        .or_else(|| raw.get("owner_extra_info").and_then(UserSummary::from_raw));
    Ok(ProjectView {
        id,
        slug: text(raw, "slug").unwrap_or_default(),
        name: text(raw, "name").unwrap_or_default(),
        description: text(raw, "description"),
        owner,
    })
}
