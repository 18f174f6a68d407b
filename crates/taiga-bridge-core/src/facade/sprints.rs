//! Sprints (backend milestones)
//!
//! Sprints carry no ref; they are addressed by name or numeric id.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::{Facade, SprintFilter};
use crate::model::{EntityKind, SprintView, Token};
use crate::normalize::{parse_date, sanitize, sprint_view};
use crate::transport::Method;
use crate::{BridgeError, Result};

const START: &str = "estimated_start";
const FINISH: &str = "estimated_finish";

/// Normalize a date field in place, returning its value
fn date_field(body: &mut Map<String, Value>, field: &str) -> Result<Option<NaiveDate>> {
    let Some(value) = body.get(field) else {
        return Ok(None);
    };
    let day = value
        .as_str()
        .and_then(parse_date)
        .ok_or_else(|| BridgeError::InvalidInput(format!("{} is not a date: {}", field, value)))?;
    body.insert(field.to_string(), Value::from(day.format("%Y-%m-%d").to_string()));
    Ok(Some(day))
}

fn check_span(start: Option<NaiveDate>, finish: Option<NaiveDate>) -> Result<()> {
    match (start, finish) {
        (Some(start), Some(finish)) if finish < start => Err(BridgeError::InvalidInput(format!(
            "sprint finishes ({}) before it starts ({})",
            finish, start
        ))),
        _ => Ok(()),
    }
}

impl Facade {
    async fn sprint_id(&self, sprint: &Token) -> Result<i64> {
        match sprint {
            Token::Id(id) => Ok(*id),
            Token::Name(name) => self.resolver.sprint_id_by_name(name).await,
        }
    }

    async fn fetch_sprint(&self, id: i64, sprint: &Token) -> Result<Value> {
        self.transport
            .request(Method::Get, &format!("milestones/{}", id), None)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    BridgeError::UnknownSprint(sprint.to_string())
                } else {
                    BridgeError::Transport(e)
                }
            })
    }

    /// Sprints matching `filter`, open before closed, then by start date
    pub async fn list_sprints(&self, filter: &SprintFilter) -> Result<Vec<SprintView>> {
        let mut sprints = self
            .resolver
            .list_sprints_raw()
            .await?
            .iter()
            .map(sprint_view)
            .collect::<Result<Vec<_>>>()?;
        sprints.retain(|sprint| filter.matches(sprint));
        sprints.sort_by(|a, b| {
            (a.closed, &a.estimated_start, a.id).cmp(&(b.closed, &b.estimated_start, b.id))
        });
        Ok(sprints)
    }

    /// Sprint by name (case-insensitive) or id
    pub async fn get_sprint(&self, sprint: &Token) -> Result<SprintView> {
        let id = self.sprint_id(sprint).await?;
        sprint_view(&self.fetch_sprint(id, sprint).await?)
    }

    /// Create a sprint; `name`, `estimated_start` and `estimated_finish` are required
    pub async fn create_sprint(&self, input: Map<String, Value>) -> Result<SprintView> {
        let mut body = input;
        sanitize(&mut body);
        body.remove("version");

        let has_name = body
            .get("name")
            .and_then(Value::as_str)
            .map_or(false, |name| !name.trim().is_empty());
        if !has_name {
            return Err(BridgeError::InvalidInput("a new sprint needs a name".into()));
        }
        let start = date_field(&mut body, START)?;
        let finish = date_field(&mut body, FINISH)?;
        if start.is_none() || finish.is_none() {
            return Err(BridgeError::InvalidInput(format!(
                "a new sprint needs {} and {}",
                START, FINISH
            )));
        }
        check_span(start, finish)?;
        body.insert("project".into(), Value::from(self.project.id));

        let created = self
            .request(Method::Post, EntityKind::Sprint.endpoint(), Some(&Value::Object(body)))
            .await?;
        sprint_view(&created)
    }

    /// Update a sprint addressed by name or id
    pub async fn update_sprint(&self, sprint: &Token, patch: Map<String, Value>) -> Result<SprintView> {
        let mut body = patch;
        sanitize(&mut body);
        let start = date_field(&mut body, START)?;
        let finish = date_field(&mut body, FINISH)?;
        check_span(start, finish)?;
        if body.keys().all(|key| key == "version") {
            return Err(BridgeError::InvalidInput(format!("nothing to update on sprint {}", sprint)));
        }

        let id = self.sprint_id(sprint).await?;
        if !body.contains_key("version") {
            let current = self.fetch_sprint(id, sprint).await?;
            if let Some(version) = current.get("version").and_then(Value::as_i64) {
                body.insert("version".into(), Value::from(version));
            }
        }
        let path = format!("milestones/{}", id);
        let updated = self
            .transport
            .request(Method::Patch, &path, Some(&Value::Object(body)))
            .await
            .map_err(|e| BridgeError::from_write(e, EntityKind::Sprint, sprint))?;
        if updated.get("id").is_some() {
            sprint_view(&updated)
        } else {
            sprint_view(&self.fetch_sprint(id, sprint).await?)
        }
    }
}
