//! Entity kinds, caller-supplied tokens, and normalized views

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Addressable entity kinds of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Epic,
    #[serde(alias = "userstory", alias = "user_story")]
    Story,
    Task,
    Issue,
    /// Backend term: milestone
    #[serde(alias = "milestone")]
    Sprint,
}

impl EntityKind {
    /// Collection endpoint, relative to the API root
    pub fn endpoint(&self) -> &'static str {
        match self {
            EntityKind::Epic => "epics",
            EntityKind::Story => "userstories",
            EntityKind::Task => "tasks",
            EntityKind::Issue => "issues",
            EntityKind::Sprint => "milestones",
        }
    }

    /// Key used by the history endpoints, where one is documented
    pub fn history_key(&self) -> Option<&'static str> {
        match self {
            EntityKind::Story => Some("userstory"),
            EntityKind::Task => Some("task"),
            EntityKind::Issue => Some("issue"),
            EntityKind::Epic | EntityKind::Sprint => None,
        }
    }

    /// Status taxonomy for this kind
    pub fn status_lookup(&self) -> Option<LookupKind> {
        match self {
            EntityKind::Epic => Some(LookupKind::EpicStatus),
            EntityKind::Story => Some(LookupKind::StoryStatus),
            EntityKind::Task => Some(LookupKind::TaskStatus),
            EntityKind::Issue => Some(LookupKind::IssueStatus),
            EntityKind::Sprint => None,
        }
    }

    /// Whether entities of this kind carry a project-scoped ref
    pub fn has_ref(&self) -> bool {
        !matches!(self, EntityKind::Sprint)
    }

    pub fn all() -> [EntityKind; 5] {
        [
            EntityKind::Epic,
            EntityKind::Story,
            EntityKind::Task,
            EntityKind::Issue,
            EntityKind::Sprint,
        ]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Epic => write!(f, "epic"),
            EntityKind::Story => write!(f, "user story"),
            EntityKind::Task => write!(f, "task"),
            EntityKind::Issue => write!(f, "issue"),
            EntityKind::Sprint => write!(f, "sprint"),
        }
    }
}

/// Per-project lookup collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    EpicStatus,
    StoryStatus,
    TaskStatus,
    IssueStatus,
    Severity,
    Priority,
    IssueType,
    Role,
    Point,
}

impl LookupKind {
    /// Dedicated listing endpoint
    pub fn endpoint(&self) -> &'static str {
        match self {
            LookupKind::EpicStatus => "epic-statuses",
            LookupKind::StoryStatus => "userstory-statuses",
            LookupKind::TaskStatus => "task-statuses",
            LookupKind::IssueStatus => "issue-statuses",
            LookupKind::Severity => "severities",
            LookupKind::Priority => "priorities",
            LookupKind::IssueType => "issue-types",
            LookupKind::Role => "roles",
            LookupKind::Point => "points",
        }
    }

    /// Array embedded in the project detail payload
    pub fn project_field(&self) -> &'static str {
        match self {
            LookupKind::EpicStatus => "epic_statuses",
            LookupKind::StoryStatus => "us_statuses",
            LookupKind::TaskStatus => "task_statuses",
            LookupKind::IssueStatus => "issue_statuses",
            LookupKind::Severity => "severities",
            LookupKind::Priority => "priorities",
            LookupKind::IssueType => "issue_types",
            LookupKind::Role => "roles",
            LookupKind::Point => "points",
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LookupKind::EpicStatus => "epic status",
            LookupKind::StoryStatus => "user story status",
            LookupKind::TaskStatus => "task status",
            LookupKind::IssueStatus => "issue status",
            LookupKind::Severity => "severity",
            LookupKind::Priority => "priority",
            LookupKind::IssueType => "issue type",
            LookupKind::Role => "role",
            LookupKind::Point => "point value",
        };
        f.write_str(label)
    }
}

/// Either a raw backend id or a human-readable name.
///
/// Numeric JSON values and numeric strings both become [`Token::Id`] through
/// [`Token::from_value`] and `From<&str>`, so a digit-only string is always an
/// id there. Build [`Token::Name`] directly for digit-only usernames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Id(i64),
    Name(String),
}

impl Token {
    /// Interpret a JSON value as a token; `None` for null/other shapes
    pub fn from_value(value: &Value) -> Option<Token> {
        match value {
            Value::Number(n) => n.as_i64().map(Token::Id),
            Value::String(s) => Some(Token::from(s.as_str())),
            _ => None,
        }
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.parse::<i64>() {
            Ok(id) => Token::Id(id),
            Err(_) => Token::Name(trimmed.to_string()),
        }
    }
}

impl From<i64> for Token {
    fn from(id: i64) -> Self {
        Token::Id(id)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Id(id) => write!(f, "{}", id),
            Token::Name(name) => f.write_str(name),
        }
    }
}

/// One named entry of a lookup collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Explicit closed flag, for statuses on backends that expose one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_closed: Option<bool>,
    /// Numeric estimate, for point values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl LookupEntry {
    pub fn from_raw(raw: &Value) -> Option<Self> {
        Some(Self {
            id: raw.get("id")?.as_i64()?,
            name: raw.get("name")?.as_str()?.to_string(),
            slug: raw.get("slug").and_then(Value::as_str).map(str::to_string),
            is_closed: raw.get("is_closed").and_then(Value::as_bool),
            value: raw.get("value").and_then(Value::as_f64),
        })
    }
}

/// Minimal user record used for display and username resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl UserSummary {
    /// Accepts user, membership, and `*_extra_info` shapes
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let id = raw
            .get("user")
            .and_then(Value::as_i64)
            .or_else(|| raw.get("id").and_then(Value::as_i64))?;
        let username = raw
            .get("username")
            .and_then(Value::as_str)
            .or_else(|| {
                raw.get("user_extra_info")
                    .and_then(|u| u.get("username"))
                    .and_then(Value::as_str)
            })?
            .to_string();
        let full_name = ["full_name_display", "full_name", "name"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Some(Self {
            id,
            username,
            full_name,
        })
    }
}

/// Which project a facade is bound to.
///
/// Deserializing goes through `From<&str>`, so `"17"` is an id in every
/// config source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, from = "RawSelector")]
pub enum ProjectSelector {
    Id(i64),
    Slug(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Id(i64),
    Text(String),
}

impl From<RawSelector> for ProjectSelector {
    fn from(raw: RawSelector) -> Self {
        match raw {
            RawSelector::Id(id) => ProjectSelector::Id(id),
            RawSelector::Text(text) => ProjectSelector::from(text.as_str()),
        }
    }
}

impl From<&str> for ProjectSelector {
    fn from(s: &str) -> Self {
        match s.trim().parse::<i64>() {
            Ok(id) => ProjectSelector::Id(id),
            Err(_) => ProjectSelector::Slug(s.trim().to_string()),
        }
    }
}

impl From<i64> for ProjectSelector {
    fn from(id: i64) -> Self {
        ProjectSelector::Id(id)
    }
}

impl fmt::Display for ProjectSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectSelector::Id(id) => write!(f, "{}", id),
            ProjectSelector::Slug(slug) => f.write_str(slug),
        }
    }
}

/// Active project summary
#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserSummary>,
}

/// Normalized epic/story/task/issue
#[derive(Debug, Clone, Serialize)]
pub struct WorkItemView {
    pub kind: EntityKind,
    pub id: i64,
    #[serde(rename = "ref")]
    pub reference: i64,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Option<String>,
    pub status_id: Option<i64>,
    pub is_closed: bool,
    pub assigned_to: Option<String>,
    pub assigned_to_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<String>,
    pub version: Option<i64>,
    #[serde(flatten)]
    pub details: ItemDetails,
}

/// Kind-specific part of a [`WorkItemView`]
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ItemDetails {
    Epic {
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        story_count: Option<i64>,
    },
    Story {
        points: Vec<RolePointView>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_points: Option<f64>,
        epics: Vec<EpicLinkView>,
        assigned_users: Vec<String>,
    },
    Task {
        #[serde(skip_serializing_if = "Option::is_none")]
        user_story_ref: Option<i64>,
        is_blocked: bool,
    },
    Issue {
        severity: Option<String>,
        priority: Option<String>,
        issue_type: Option<String>,
    },
}

/// Estimate of one role on a story, with labels resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolePointView {
    pub role_id: i64,
    pub role: Option<String>,
    pub point_id: i64,
    pub point: Option<String>,
}

/// Epic a story is linked to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicLinkView {
    pub id: i64,
    #[serde(rename = "ref")]
    pub reference: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Normalized sprint (milestone)
#[derive(Debug, Clone, Serialize)]
pub struct SprintView {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub estimated_start: Option<String>,
    pub estimated_finish: Option<String>,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_points: Option<f64>,
    pub story_refs: Vec<i64>,
}

/// One comment extracted from a history or timeline feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub created_date: Option<String>,
    pub author: Option<String>,
    pub text: String,
}
