//! Sprint (milestone) input resolution

use serde_json::Value;

use super::Resolver;
use crate::{BridgeError, Result};

/// Inputs meaning "take it out of any sprint"
pub const BACKLOG_SYNONYMS: &[&str] = &[
    "backlog",
    "none",
    "no sprint",
    "nosprint",
    "unassigned",
    "unscheduled",
    "null",
    "nil",
];

/// Outcome of interpreting a caller's sprint field.
///
/// `Unspecified` and `Clear` must never collapse into each other: the first
/// leaves the backend field untouched, the second writes `milestone: null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprintSelection {
    Unspecified,
    Clear,
    Assign(i64),
}

impl SprintSelection {
    /// Value to write for `milestone`, or `None` to leave it out of the body
    pub fn as_write_value(&self) -> Option<Value> {
        match self {
            SprintSelection::Unspecified => None,
            SprintSelection::Clear => Some(Value::Null),
            SprintSelection::Assign(id) => Some(Value::from(*id)),
        }
    }
}

pub fn is_backlog_synonym(input: &str) -> bool {
    let normalized = input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    BACKLOG_SYNONYMS.contains(&normalized.as_str())
}

fn sprint_named(sprints: &[Value], name: &str) -> Option<i64> {
    let wanted = name.trim().to_lowercase();
    sprints
        .iter()
        .find(|sprint| {
            sprint
                .get("name")
                .and_then(Value::as_str)
                .map_or(false, |n| n.trim().to_lowercase() == wanted)
        })
        .and_then(|sprint| sprint.get("id").and_then(Value::as_i64))
}

impl Resolver {
    /// Raw sprints of the project; not cached since sprints are created here
    pub async fn list_sprints_raw(&self) -> Result<Vec<Value>> {
        let path = self.listing_path("milestones");
        match self.get(&path).await? {
            Value::Array(items) => Ok(items),
            other => Err(BridgeError::UnexpectedResponse(format!(
                "milestone listing is not an array: {}",
                other
            ))),
        }
    }

    /// Sprint id by case-insensitive exact name
    pub async fn sprint_id_by_name(&self, name: &str) -> Result<i64> {
        let sprints = self.list_sprints_raw().await?;
        sprint_named(&sprints, name).ok_or_else(|| BridgeError::UnknownSprint(name.to_string()))
    }

    /// Interpret a sprint field. `None` is an omitted field.
    ///
    /// A string matches a sprint name; failing that, a numeric string is
    /// accepted only as the id of a listed sprint.
    pub async fn resolve_sprint_input(&self, value: Option<&Value>) -> Result<SprintSelection> {
        let value = match value {
            None => return Ok(SprintSelection::Unspecified),
            Some(value) => value,
        };
        match value {
            Value::Null => Ok(SprintSelection::Clear),
            Value::Number(n) => n
                .as_i64()
                .map(SprintSelection::Assign)
                .ok_or_else(|| BridgeError::InvalidInput(format!("sprint id {} is not an integer", n))),
            Value::String(s) if is_backlog_synonym(s) => Ok(SprintSelection::Clear),
            Value::String(s) => {
                let sprints = self.list_sprints_raw().await?;
                sprint_named(&sprints, s)
                    .or_else(|| {
                        let id = s.trim().parse::<i64>().ok()?;
                        sprints
                            .iter()
                            .any(|sprint| sprint.get("id").and_then(Value::as_i64) == Some(id))
                            .then_some(id)
                    })
                    .map(SprintSelection::Assign)
                    .ok_or_else(|| BridgeError::UnknownSprint(s.clone()))
            }
            other => Err(BridgeError::InvalidInput(format!(
                "sprint must be a name, an id or null, got {}",
                other
            ))),
        }
    }
}
