//! Reference Resolver
//!
//! Maps the tokens a human supplies (usernames, refs, lookup labels, sprint
//! names, role/point labels) to backend ids. One resolver is bound to exactly
//! one project; its caches live as long as it does and are never invalidated.

mod lookups;
mod points;
mod refs;
mod sprint;
mod users;

pub use points::points_body;
pub use sprint::{is_backlog_synonym, SprintSelection, BACKLOG_SYNONYMS};

use serde_json::Value;
use std::sync::Arc;

use crate::cache::{Cache, MemoryCache};
use crate::model::{EntityKind, LookupEntry, LookupKind, UserSummary};
use crate::normalize::NameLookup;
use crate::transport::{Method, Query, Transport};
use crate::{BridgeError, Result};

/// Project-scoped token resolution
pub struct Resolver {
    transport: Arc<dyn Transport>,
    project_id: i64,
    /// Project detail payload, used for embedded lookups and member seeds
    project: Arc<Value>,
    /// Lowercased username -> user id
    usernames: MemoryCache<String, i64>,
    /// User id -> summary, for display
    users: MemoryCache<i64, UserSummary>,
    lookups: MemoryCache<LookupKind, Arc<Vec<LookupEntry>>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("project_id", &self.project_id)
            .field("usernames", &self.usernames.len())
            .field("lookups", &self.lookups.len())
            .finish()
    }
}

impl Resolver {
    /// Bind a resolver to the project described by `project` (detail payload).
    ///
    /// The owner and `members` records embedded in the payload seed the user
    /// cache, so memberships that omit usernames do not hide them.
    pub fn new(transport: Arc<dyn Transport>, project: Value) -> Result<Self> {
        let project_id = project
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| BridgeError::UnexpectedResponse("project without numeric id".into()))?;

        let resolver = Self {
            transport,
            project_id,
            project: Arc::new(project),
            usernames: MemoryCache::new(),
            users: MemoryCache::new(),
            lookups: MemoryCache::new(),
        };
        resolver.seed_users_from_project();
        Ok(resolver)
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    /// Raw project detail this resolver is bound to
    pub fn project(&self) -> &Value {
        &self.project
    }

    /// Project-scoped listing path for a collection endpoint
    pub(crate) fn listing_path(&self, endpoint: &str) -> String {
        Query::new(endpoint).param("project", self.project_id).build()
    }

    pub(crate) async fn get(&self, path: &str) -> Result<Value> {
        Ok(self.transport.request(Method::Get, path, None).await?)
    }

    /// Warm every cache a view of `kind` can draw labels from.
    ///
    /// Failures are swallowed; views then fall back to siblings or raw ids.
    pub async fn prepare_views(&self, kind: EntityKind) {
        self.warm_users().await;
        if let Some(status) = kind.status_lookup() {
            self.lookup_entries(status).await;
        }
        match kind {
            EntityKind::Issue => {
                for taxonomy in [LookupKind::Severity, LookupKind::Priority, LookupKind::IssueType] {
                    self.lookup_entries(taxonomy).await;
                }
            }
            EntityKind::Story => {
                self.lookup_entries(LookupKind::Role).await;
                self.lookup_entries(LookupKind::Point).await;
            }
            _ => {}
        }
    }
}

impl NameLookup for Resolver {
    fn lookup(&self, kind: LookupKind, id: i64) -> Option<LookupEntry> {
        self.lookups
            .get(&kind)
            .and_then(|entries| entries.iter().find(|entry| entry.id == id).cloned())
    }

    fn user(&self, id: i64) -> Option<UserSummary> {
        self.users.get(&id)
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
            "owner": {"id": 9, "username": "owner", "full_name_display": "Project Owner"},
            "members": [{"id": 9, "username": "owner"}],
            "roles": [{"id": 3, "name": "Design", "slug": "design"}, {"id": 4, "name": "Back", "slug": "back"}],
            "points": [{"id": 99, "name": "?", "value": null}, {"id": 100, "name": "3", "value": 3.0}],
            "us_statuses": [{"id": 11, "name": "New", "is_closed": false}, {"id": 12, "name": "Done", "is_closed": true}]
        })
    }

    pub fn resolver() -> (Arc<ScriptedTransport>, Resolver) {
        let transport = Arc::new(ScriptedTransport::new());
        let resolver = Resolver::new(transport.clone(), project()).unwrap();
        (transport, resolver)
    }
}
