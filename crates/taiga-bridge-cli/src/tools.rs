//! Named tool operations over the facade
//!
//! Every tool takes one JSON object of arguments and returns the normalized
//! payload of the facade call behind it.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use taiga_bridge_core::{
    BridgeError, EntityKind, Facade, ListFilter, LookupKind, ProjectSelector, Result,
    SprintFilter, Token,
};

/// Work item kinds exposed as list/get/create/update tool families
const ITEM_KINDS: [(EntityKind, &str, &str); 4] = [
    (EntityKind::Epic, "epic", "epics"),
    (EntityKind::Story, "story", "stories"),
    (EntityKind::Task, "task", "tasks"),
    (EntityKind::Issue, "issue", "issues"),
];

/// Entity kind from a user-typed name, singular or plural
pub fn kind_from_name(name: &str) -> Option<EntityKind> {
    match name.trim().to_lowercase().as_str() {
        "epic" | "epics" => Some(EntityKind::Epic),
        "story" | "stories" | "userstory" | "userstories" | "user_story" => {
            Some(EntityKind::Story)
        }
        "task" | "tasks" => Some(EntityKind::Task),
        "issue" | "issues" => Some(EntityKind::Issue),
        "sprint" | "sprints" | "milestone" | "milestones" => Some(EntityKind::Sprint),
        _ => None,
    }
}

/// Lookup kind from its snake_case name (`story_status`, `severity`, ...)
pub fn lookup_from_name(name: &str) -> Option<LookupKind> {
    serde_json::from_value(Value::from(name.trim().to_lowercase())).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOp {
    List,
    Get,
    Create,
    Update,
}

/// `list_stories`, `get_story`, ... split into operation and kind
fn item_tool(name: &str) -> Option<(ItemOp, EntityKind)> {
    let (verb, noun) = name.split_once('_')?;
    let op = match verb {
        "list" => ItemOp::List,
        "get" => ItemOp::Get,
        "create" => ItemOp::Create,
        "update" => ItemOp::Update,
        _ => return None,
    };
    ITEM_KINDS.iter().find_map(|(kind, singular, plural)| {
        let expected = if op == ItemOp::List { plural } else { singular };
        (noun == *expected).then_some((op, *kind))
    })
}

fn ref_schema() -> Value {
    json!({"type": "integer", "description": "Project-scoped reference number"})
}

fn kind_schema() -> Value {
    json!({"type": "string", "enum": ["epic", "story", "task", "issue"]})
}

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

fn filter_properties() -> Value {
    json!({
        "status": {"description": "Status name or id, or a list of them"},
        "assigned_to": {"description": "Username or user id"},
        "sprint": {"description": "Sprint name or id; null or \"backlog\" for unscheduled items"},
        "epic": {"type": "integer", "description": "Epic ref (stories only)"},
        "severity": {"description": "Issue severity name(s)"},
        "priority": {"description": "Issue priority name(s)"},
        "type": {"description": "Issue type name(s)"},
        "date_field": {"type": "string", "enum": ["created_date", "modified_date", "finished_date", "due_date"]},
        "from": {"type": "string", "format": "date"},
        "to": {"type": "string", "format": "date"}
    })
}

/// Tool descriptors for `tools/list`
pub fn tool_specs() -> Vec<Value> {
    let mut tools = Vec::new();

    for (kind, singular, plural) in ITEM_KINDS {
        tools.push(tool(
            &format!("list_{}", plural),
            &format!("List {} of the active project, open first then by ref", plural),
            filter_properties(),
            &[],
        ));
        tools.push(tool(
            &format!("get_{}", singular),
            &format!("Get one {} by ref", kind),
            json!({"ref": ref_schema()}),
            &["ref"],
        ));
        tools.push(tool(
            &format!("create_{}", singular),
            &format!(
                "Create a {}; names (status, assignee, sprint, ...) are resolved to ids",
                kind
            ),
            json!({
                "subject": {"type": "string"},
                "comment": {"type": "string", "description": "Posted after creation"}
            }),
            &["subject"],
        ));
        tools.push(tool(
            &format!("update_{}", singular),
            &format!("Update a {} by ref; other properties are the fields to change", kind),
            json!({"ref": ref_schema()}),
            &["ref"],
        ));
    }

    tools.extend([
        tool(
            "list_sprints",
            "List sprints, open first then by start date",
            json!({
                "from": {"type": "string", "format": "date"},
                "to": {"type": "string", "format": "date"},
                "closed": {"type": "boolean"}
            }),
            &[],
        ),
        tool(
            "get_sprint",
            "Get a sprint by name or id",
            json!({"sprint": {"description": "Sprint name or id"}}),
            &["sprint"],
        ),
        tool(
            "create_sprint",
            "Create a sprint",
            json!({
                "name": {"type": "string"},
                "estimated_start": {"type": "string", "format": "date"},
                "estimated_finish": {"type": "string", "format": "date"}
            }),
            &["name", "estimated_start", "estimated_finish"],
        ),
        tool(
            "update_sprint",
            "Update a sprint addressed by name or id",
            json!({"sprint": {"description": "Sprint name or id"}}),
            &["sprint"],
        ),
        tool(
            "list_comments",
            "Comments on an epic, story, task or issue, oldest first",
            json!({"kind": kind_schema(), "ref": ref_schema()}),
            &["kind", "ref"],
        ),
        tool(
            "add_comment",
            "Add a comment to an epic, story, task or issue",
            json!({"kind": kind_schema(), "ref": ref_schema(), "text": {"type": "string"}}),
            &["kind", "ref", "text"],
        ),
        tool(
            "link_epic_story",
            "Link a user story to an epic",
            json!({"epic_ref": ref_schema(), "story_ref": ref_schema()}),
            &["epic_ref", "story_ref"],
        ),
        tool(
            "unlink_epic_story",
            "Remove the link between a user story and an epic",
            json!({"epic_ref": ref_schema(), "story_ref": ref_schema()}),
            &["epic_ref", "story_ref"],
        ),
        tool(
            "story_epics",
            "Epics a user story is linked to",
            json!({"ref": ref_schema()}),
            &["ref"],
        ),
        tool(
            "set_story_epics",
            "Make a list of epic refs the exact epic set of a user story",
            json!({"ref": ref_schema(), "epics": {"type": "array", "items": {"type": "integer"}}}),
            &["ref", "epics"],
        ),
        tool(
            "list_lookup",
            "Valid values of a lookup collection",
            json!({"kind": {"type": "string", "enum": [
                "epic_status", "story_status", "task_status", "issue_status",
                "severity", "priority", "issue_type", "role", "point"
            ]}}),
            &["kind"],
        ),
        tool("get_project", "The active project", json!({}), &[]),
        tool(
            "switch_project",
            "Bind to another project by id or slug",
            json!({"project": {"description": "Project id or slug"}}),
            &["project"],
        ),
    ]);

    tools
}

fn args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| BridgeError::InvalidInput(format!("invalid arguments: {}", e)))
}

fn object(arguments: Value) -> Result<Map<String, Value>> {
    match arguments {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(BridgeError::InvalidInput(format!(
            "arguments must be an object, got {}",
            other
        ))),
    }
}

/// Remove and parse an integer ref argument
fn take_ref(map: &mut Map<String, Value>, key: &str) -> Result<i64> {
    match map.remove(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().trim_start_matches('#').parse().ok(),
        _ => None,
    }
    .ok_or_else(|| BridgeError::InvalidInput(format!("{} must be an integer ref", key)))
}

fn take_sprint(map: &mut Map<String, Value>) -> Result<Token> {
    map.remove("sprint")
        .as_ref()
        .and_then(Token::from_value)
        .ok_or_else(|| BridgeError::InvalidInput("sprint must be a name or id".into()))
}

fn take_kind(map: &mut Map<String, Value>) -> Result<EntityKind> {
    let name = map
        .remove("kind")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    kind_from_name(&name)
        .ok_or_else(|| BridgeError::InvalidInput(format!("unknown entity kind {:?}", name)))
}

#[derive(Deserialize)]
struct LinkArgs {
    epic_ref: i64,
    story_ref: i64,
}

/// The facade plus the tool dispatch
#[derive(Debug)]
pub struct ToolBox {
    facade: Facade,
}

impl ToolBox {
    pub fn new(facade: Facade) -> Self {
        Self { facade }
    }

    pub fn facade(&self) -> &Facade {
        &self.facade
    }

    /// Run tool `name`; errors are the facade's, unchanged
    pub async fn call(&mut self, name: &str, arguments: Value) -> Result<Value> {
        if let Some((op, kind)) = item_tool(name) {
            return self.item_call(op, kind, arguments).await;
        }

        let mut map = object(arguments)?;
        let facade = &self.facade;
        let payload = match name {
            "list_sprints" => {
                let filter: SprintFilter = args(Value::Object(map))?;
                serde_json::to_value(facade.list_sprints(&filter).await?)?
            }
            "get_sprint" => {
                let sprint = take_sprint(&mut map)?;
                serde_json::to_value(facade.get_sprint(&sprint).await?)?
            }
            "create_sprint" => serde_json::to_value(facade.create_sprint(map).await?)?,
            "update_sprint" => {
                let sprint = take_sprint(&mut map)?;
                serde_json::to_value(facade.update_sprint(&sprint, map).await?)?
            }
            "list_comments" => {
                let kind = take_kind(&mut map)?;
                let reference = take_ref(&mut map, "ref")?;
                serde_json::to_value(facade.list_comments(kind, reference).await?)?
            }
            "add_comment" => {
                let kind = take_kind(&mut map)?;
                let reference = take_ref(&mut map, "ref")?;
                let text = map
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                serde_json::to_value(facade.add_comment(kind, reference, &text).await?)?
            }
            "link_epic_story" => {
                let link: LinkArgs = args(Value::Object(map))?;
                facade.link_epic_story(link.epic_ref, link.story_ref).await?;
                json!({"linked": true, "epic_ref": link.epic_ref, "story_ref": link.story_ref})
            }
            "unlink_epic_story" => {
                let link: LinkArgs = args(Value::Object(map))?;
                facade.unlink_epic_story(link.epic_ref, link.story_ref).await?;
                json!({"linked": false, "epic_ref": link.epic_ref, "story_ref": link.story_ref})
            }
            "story_epics" => {
                let reference = take_ref(&mut map, "ref")?;
                serde_json::to_value(facade.story_epics(reference).await?)?
            }
            "set_story_epics" => {
                let reference = take_ref(&mut map, "ref")?;
                let epics = map.remove("epics").unwrap_or_else(|| json!([]));
                serde_json::to_value(facade.set_story_epics_value(reference, &epics).await?)?
            }
            "list_lookup" => {
                let name = map
                    .get("kind")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let kind = lookup_from_name(name).ok_or_else(|| {
                    BridgeError::InvalidInput(format!("unknown lookup kind {:?}", name))
                })?;
                serde_json::to_value(facade.list_lookup(kind).await?)?
            }
            "get_project" => serde_json::to_value(facade.project())?,
            "switch_project" => {
                let selector = match map.get("project") {
                    Some(Value::Number(n)) => n.as_i64().map(ProjectSelector::Id),
                    Some(Value::String(s)) if !s.trim().is_empty() => {
                        Some(ProjectSelector::from(s.as_str()))
                    }
                    _ => None,
                }
                .ok_or_else(|| BridgeError::InvalidInput("project must be an id or slug".into()))?;
                let next = facade.switch_project(&selector).await?;
                self.facade = next;
                serde_json::to_value(self.facade.project())?
            }
            other => return Err(BridgeError::InvalidInput(format!("unknown tool {}", other))),
        };
        Ok(payload)
    }

    async fn item_call(&self, op: ItemOp, kind: EntityKind, arguments: Value) -> Result<Value> {
        let facade = &self.facade;
        let payload = match op {
            ItemOp::List => {
                let filter: ListFilter = args(arguments)?;
                serde_json::to_value(facade.list(kind, &filter).await?)?
            }
            ItemOp::Get => {
                let reference = take_ref(&mut object(arguments)?, "ref")?;
                serde_json::to_value(facade.get(kind, reference).await?)?
            }
            ItemOp::Create => serde_json::to_value(facade.create(kind, object(arguments)?).await?)?,
            ItemOp::Update => {
                let mut patch = object(arguments)?;
                let reference = take_ref(&mut patch, "ref")?;
                serde_json::to_value(facade.update(kind, reference, patch).await?)?
            }
        };
        Ok(payload)
    }
}
