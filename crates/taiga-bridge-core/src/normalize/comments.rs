//! Comment extraction from history and timeline feeds

use serde_json::Value;

use crate::model::CommentView;

fn text_of(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn author_of(user: Option<&Value>) -> Option<String> {
    let user = user?;
    ["username", "name", "full_name_display"]
        .iter()
        .find_map(|key| text_of(user.get(*key)))
}

/// Comments of a per-entity history feed, oldest first as delivered
pub fn comments_from_history(entries: &Value) -> Vec<CommentView> {
    let Some(entries) = entries.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|entry| {
            entry
                .get("delete_comment_date")
                .map_or(true, Value::is_null)
        })
        .filter_map(|entry| {
            Some(CommentView {
                text: text_of(entry.get("comment"))?,
                created_date: text_of(entry.get("created_at")),
                author: author_of(entry.get("user")),
            })
        })
        .collect()
}

const EPIC_EVENT_PREFIX: &str = "epics.epic";

/// `namespace:object_id` key of a timeline entry, e.g. `epics.epic:12`
fn timeline_key(entry: &Value) -> Option<String> {
    let event = entry.get("event_type")?.as_str()?;
    let object_id = entry.get("object_id")?.as_i64()?;
    let namespace = event.rsplit_once('.').map_or(event, |(head, _)| head);
    Some(format!("{}:{}", namespace, object_id))
}

fn mentions_epic(entry: &Value, epic_id: i64, epic_ref: Option<i64>) -> bool {
    if timeline_key(entry).as_deref() == Some(format!("{}:{}", EPIC_EVENT_PREFIX, epic_id).as_str()) {
        return true;
    }
    let Some(epic) = entry.get("data").and_then(|d| d.get("epic")) else {
        return false;
    };
    if epic.get("id").and_then(Value::as_i64) == Some(epic_id) {
        return true;
    }
    epic_ref.is_some() && epic.get("ref").and_then(Value::as_i64) == epic_ref
}

/// Comments on one epic, scanned out of the project-wide timeline
pub fn comments_from_timeline(entries: &Value, epic_id: i64, epic_ref: Option<i64>) -> Vec<CommentView> {
    let Some(entries) = entries.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|entry| mentions_epic(entry, epic_id, epic_ref))
        .filter_map(|entry| {
            let data = entry.get("data");
            Some(CommentView {
                text: text_of(data.and_then(|d| d.get("comment")))?,
                created_date: text_of(entry.get("created")),
                author: author_of(data.and_then(|d| d.get("user"))),
            })
        })
        .collect()
}
