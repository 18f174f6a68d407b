//! Domain Facade
//!
//! The single entry point callers use. Every operation resolves the human
//! tokens it was given through the [`Resolver`], performs its backend calls
//! through the [`Transport`], and returns normalized views.
//!
//! A facade is bound to one project for its whole lifetime; switching
//! projects builds a fresh facade with fresh caches.

mod comments;
mod filter;
mod items;
mod relations;
mod sprints;
mod write;

pub use filter::{ListFilter, SprintFilter};

use serde_json::Value;
use std::sync::Arc;

use crate::model::{
    EntityKind, LookupEntry, LookupKind, ProjectSelector, ProjectView, WorkItemView,
};
use crate::normalize::{project_view, work_item_view};
use crate::resolver::Resolver;
use crate::transport::{Method, Query, Transport};
use crate::{BridgeError, Result, ResultExt};

/// Project-bound facade over the backend
pub struct Facade {
    transport: Arc<dyn Transport>,
    resolver: Resolver,
    project: ProjectView,
}

impl std::fmt::Debug for Facade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Facade")
            .field("project", &self.project.slug)
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl Facade {
    /// Fetch the project named by `selector` and bind a facade to it
    pub async fn connect(transport: Arc<dyn Transport>, selector: &ProjectSelector) -> Result<Self> {
        let path = match selector {
            ProjectSelector::Id(id) => format!("projects/{}", id),
            ProjectSelector::Slug(slug) => Query::new("projects/by_slug").param("slug", slug).build(),
        };
        let raw = transport
            .request(Method::Get, &path, None)
            .await
            .map_err(BridgeError::from)
            .with_context(|| format!("Failed to load project {}", selector))?;
        Self::from_project(transport, raw)
    }

    /// Bind a facade to an already fetched project detail payload
    pub fn from_project(transport: Arc<dyn Transport>, raw: Value) -> Result<Self> {
        let project = project_view(&raw)?;
        let resolver = Resolver::new(Arc::clone(&transport), raw)?;
        tracing::info!("Connected to project {} ({})", project.slug, project.id);
        Ok(Self {
            transport,
            resolver,
            project,
        })
    }

    /// Fresh facade for another project; this one is left untouched
    pub async fn switch_project(&self, selector: &ProjectSelector) -> Result<Facade> {
        tracing::info!("Switching project from {} to {}", self.project.slug, selector);
        Facade::connect(Arc::clone(&self.transport), selector).await
    }

    /// The active project
    pub fn project(&self) -> &ProjectView {
        &self.project
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Valid values of a lookup collection
    pub async fn list_lookup(&self, kind: LookupKind) -> Result<Vec<LookupEntry>> {
        Ok(self.resolver.lookup_entries(kind).await.as_ref().clone())
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        Ok(self.transport.request(method, path, body).await?)
    }

    /// Detail payload of a ref-addressed entity; 404 reads as an unknown ref
    async fn fetch(&self, kind: EntityKind, id: i64, reference: i64) -> Result<Value> {
        let path = format!("{}/{}", kind.endpoint(), id);
        self.transport
            .request(Method::Get, &path, None)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    BridgeError::UnknownReference { kind, reference }
                } else {
                    BridgeError::Transport(e)
                }
            })
    }

    /// Version of the entity as stored right now, when it carries one
    async fn current_version(&self, kind: EntityKind, id: i64, reference: i64) -> Result<Option<i64>> {
        let current = self.fetch(kind, id, reference).await?;
        Ok(current.get("version").and_then(Value::as_i64))
    }

    fn view(&self, kind: EntityKind, raw: &Value) -> Result<WorkItemView> {
        work_item_view(kind, raw, &self.resolver)
    }
}

fn ensure_work_item(kind: EntityKind) -> Result<()> {
    if kind.has_ref() {
        Ok(())
    } else {
        Err(BridgeError::InvalidInput(format!(
            "{}s are addressed by name or id, not by ref",
            kind
        )))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    pub fn project() -> Value {
        json!({
            "id": 1,
            "slug": "demo",
            "name": "Demo",
            "description": "Demo project",
            "owner": {"id": 9, "username": "owner"},
            "members": [{"id": 5, "username": "alice"}, {"id": 9, "username": "owner"}],
            "epic_statuses": [{"id": 21, "name": "New"}, {"id": 22, "name": "Done", "is_closed": true}],
            "us_statuses": [{"id": 11, "name": "New"}, {"id": 12, "name": "Done", "is_closed": true}],
            "task_statuses": [{"id": 31, "name": "New"}, {"id": 32, "name": "Closed", "is_closed": true}],
            "issue_statuses": [{"id": 41, "name": "New"}, {"id": 42, "name": "Rejected", "is_closed": true}],
            "severities": [{"id": 51, "name": "Minor"}, {"id": 52, "name": "Critical"}],
            "priorities": [{"id": 61, "name": "Low"}, {"id": 62, "name": "High"}],
            "issue_types": [{"id": 71, "name": "Bug"}, {"id": 72, "name": "Question"}],
            "roles": [{"id": 3, "name": "Design", "slug": "design"}],
            "points": [{"id": 99, "name": "?"}, {"id": 100, "name": "3", "value": 3.0}]
        })
    }

    pub fn facade() -> (Arc<ScriptedTransport>, Facade) {
        let transport = Arc::new(ScriptedTransport::new());
        let facade = Facade::from_project(transport.clone(), project()).unwrap();
        (transport, facade)
    }
}
