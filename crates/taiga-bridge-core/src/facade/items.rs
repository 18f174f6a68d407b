//! List/get/create/update for epics, user stories, tasks and issues

use serde_json::{Map, Value};

use super::filter::sort_views;
use super::write::WritePlan;
use super::{ensure_work_item, Facade, ListFilter};
use crate::model::{EntityKind, WorkItemView};
use crate::transport::Method;
use crate::{BridgeError, Result};

impl Facade {
    /// Entities of `kind` matching `filter`, open before closed, then by ref
    pub async fn list(&self, kind: EntityKind, filter: &ListFilter) -> Result<Vec<WorkItemView>> {
        ensure_work_item(kind)?;
        let filter = self.resolve_filter(kind, filter).await?;
        let raws = self.resolver.list_raw(kind).await?;
        self.resolver.prepare_views(kind).await;

        let mut views = raws
            .iter()
            .filter(|raw| filter.matches(raw))
            .map(|raw| self.view(kind, raw))
            .collect::<Result<Vec<_>>>()?;
        sort_views(&mut views);
        Ok(views)
    }

    /// Entity of `kind` with `reference`
    pub async fn get(&self, kind: EntityKind, reference: i64) -> Result<WorkItemView> {
        ensure_work_item(kind)?;
        let id = self.resolver.require_id_by_ref(kind, reference).await?;
        let raw = self.fetch(kind, id, reference).await?;
        self.resolver.prepare_views(kind).await;
        self.view(kind, &raw)
    }

    /// Create an entity of `kind`.
    ///
    /// A `comment` is posted and, for stories, `epics` are linked after the
    /// entity exists. Those secondary steps are best-effort: the entity stays
    /// created when they fail, and the failure is only logged.
    pub async fn create(&self, kind: EntityKind, input: Map<String, Value>) -> Result<WorkItemView> {
        ensure_work_item(kind)?;
        let WritePlan {
            mut body,
            comment,
            epics,
        } = self.prepare_write(kind, input).await?;

        let has_subject = body
            .get("subject")
            .and_then(Value::as_str)
            .map_or(false, |s| !s.trim().is_empty());
        if !has_subject {
            return Err(BridgeError::InvalidInput(format!("a new {} needs a subject", kind)));
        }
        body.remove("version");
        body.insert("project".into(), Value::from(self.project.id));

        let created = self
            .request(Method::Post, kind.endpoint(), Some(&Value::Object(body)))
            .await?;
        let id = created.get("id").and_then(Value::as_i64).ok_or_else(|| {
            BridgeError::UnexpectedResponse(format!("created {} without id", kind))
        })?;
        let reference = created
            .get("ref")
            .and_then(Value::as_i64)
            .ok_or_else(|| BridgeError::UnexpectedResponse(format!("created {} without ref", kind)))?;
        tracing::debug!("Created {} #{}", kind, reference);

        let mut touched = false;
        if let Some(targets) = epics.filter(|targets| !targets.is_empty()) {
            match self.sync_story_epics(id, reference, &targets).await {
                Ok(()) => touched = true,
                Err(e) => tracing::warn!("Linking epics to new {} #{} failed: {}", kind, reference, e),
            }
        }
        if let Some(text) = comment {
            match self.post_comment(kind, id, reference, &text).await {
                Ok(_) => touched = true,
                Err(e) => tracing::warn!("Commenting on new {} #{} failed: {}", kind, reference, e),
            }
        }

        let raw = if touched {
            self.fetch(kind, id, reference).await.unwrap_or(created)
        } else {
            created
        };
        self.resolver.prepare_views(kind).await;
        self.view(kind, &raw)
    }

    /// Update the entity of `kind` with `reference`.
    ///
    /// Without an explicit `version` the current one is fetched right before
    /// the patch. A stale version surfaces as
    /// [`BridgeError::VersionConflict`]; nothing is retried here. For stories,
    /// an `epics` list is synced after the patch commits, best-effort.
    pub async fn update(&self, kind: EntityKind, reference: i64, patch: Map<String, Value>) -> Result<WorkItemView> {
        ensure_work_item(kind)?;
        let plan = self.prepare_write(kind, patch).await?;
        if !plan.has_changes() && plan.comment.is_none() && plan.epics.is_none() {
            return Err(BridgeError::InvalidInput(format!(
                "nothing to update on {} #{}",
                kind, reference
            )));
        }
        let id = self.resolver.require_id_by_ref(kind, reference).await?;

        let patched = if plan.has_changes() || plan.comment.is_some() {
            let mut body = plan.body;
            if let Some(text) = plan.comment {
                body.insert("comment".into(), Value::String(text));
            }
            if !body.contains_key("version") {
                if let Some(version) = self.current_version(kind, id, reference).await? {
                    body.insert("version".into(), Value::from(version));
                }
            }
            let path = format!("{}/{}", kind.endpoint(), id);
            let raw = self
                .transport
                .request(Method::Patch, &path, Some(&Value::Object(body)))
                .await
                .map_err(|e| BridgeError::from_write(e, kind, reference))?;
            Some(raw).filter(|raw| raw.get("id").is_some())
        } else {
            None
        };

        let mut synced = false;
        if let Some(targets) = plan.epics {
            match self.sync_story_epics(id, reference, &targets).await {
                Ok(()) => synced = true,
                Err(e) => tracing::warn!("Syncing epics of {} #{} failed: {}", kind, reference, e),
            }
        }

        // the write is committed; a failed re-read falls back to the patch response
        let raw = match patched {
            Some(raw) if !synced => raw,
            patched => match self.fetch(kind, id, reference).await {
                Ok(raw) => raw,
                Err(e) => match patched {
                    Some(raw) => {
                        tracing::warn!("Re-reading {} #{} after update failed: {}", kind, reference, e);
                        raw
                    }
                    None => return Err(e),
                },
            },
        };
        self.resolver.prepare_views(kind).await;
        self.view(kind, &raw)
    }

    pub async fn list_epics(&self, filter: &ListFilter) -> Result<Vec<WorkItemView>> {
        self.list(EntityKind::Epic, filter).await
    }

    pub async fn get_epic(&self, reference: i64) -> Result<WorkItemView> {
        self.get(EntityKind::Epic, reference).await
    }

    pub async fn create_epic(&self, input: Map<String, Value>) -> Result<WorkItemView> {
        self.create(EntityKind::Epic, input).await
    }

    pub async fn update_epic(&self, reference: i64, patch: Map<String, Value>) -> Result<WorkItemView> {
        self.update(EntityKind::Epic, reference, patch).await
    }

    pub async fn list_stories(&self, filter: &ListFilter) -> Result<Vec<WorkItemView>> {
        self.list(EntityKind::Story, filter).await
    }

    pub async fn get_story(&self, reference: i64) -> Result<WorkItemView> {
        self.get(EntityKind::Story, reference).await
    }

    pub async fn create_story(&self, input: Map<String, Value>) -> Result<WorkItemView> {
        self.create(EntityKind::Story, input).await
    }

    pub async fn update_story(&self, reference: i64, patch: Map<String, Value>) -> Result<WorkItemView> {
        self.update(EntityKind::Story, reference, patch).await
    }

    pub async fn list_tasks(&self, filter: &ListFilter) -> Result<Vec<WorkItemView>> {
        self.list(EntityKind::Task, filter).await
    }

    pub async fn get_task(&self, reference: i64) -> Result<WorkItemView> {
        self.get(EntityKind::Task, reference).await
    }

    pub async fn create_task(&self, input: Map<String, Value>) -> Result<WorkItemView> {
        self.create(EntityKind::Task, input).await
    }

    pub async fn update_task(&self, reference: i64, patch: Map<String, Value>) -> Result<WorkItemView> {
        self.update(EntityKind::Task, reference, patch).await
    }

    pub async fn list_issues(&self, filter: &ListFilter) -> Result<Vec<WorkItemView>> {
        self.list(EntityKind::Issue, filter).await
    }

    pub async fn get_issue(&self, reference: i64) -> Result<WorkItemView> {
        self.get(EntityKind::Issue, reference).await
    }

    pub async fn create_issue(&self, input: Map<String, Value>) -> Result<WorkItemView> {
        self.create(EntityKind::Issue, input).await
    }

    pub async fn update_issue(&self, reference: i64, patch: Map<String, Value>) -> Result<WorkItemView> {
        self.update(EntityKind::Issue, reference, patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::model::ItemDetails;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_list_sorts_open_first_then_by_ref() {
        let (transport, facade) = fixtures::facade();
        transport.respond(
            Method::Get,
            "tasks?project=1",
            json!([
                {"id": 1, "ref": 4, "subject": "d", "status": 32},
                {"id": 2, "ref": 9, "subject": "c", "status": 31},
                {"id": 3, "ref": 2, "subject": "b", "status": 31},
                {"id": 4, "ref": 1, "subject": "a", "status_extra_info": {"name": "Closed", "is_closed": true}}
            ]),
        );

        let views = facade.list_tasks(&ListFilter::new()).await.unwrap();
        let refs: Vec<i64> = views.iter().map(|v| v.reference).collect();
        assert_eq!(refs, vec![2, 9, 1, 4]);
        assert_eq!(views[2].status.as_deref(), Some("Closed"));
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let (transport, facade) = fixtures::facade();
        transport.respond(
            Method::Get,
            "issues?project=1",
            json!([
                {"id": 1, "ref": 1, "status": 41, "severity": 52, "assigned_to": 5},
                {"id": 2, "ref": 2, "status": 41, "severity": 51, "assigned_to": 5},
                {"id": 3, "ref": 3, "status": 42, "severity": 52, "assigned_to": 9}
            ]),
        );

        let filter: ListFilter =
            serde_json::from_value(json!({"severity": "Critical", "assigned_to": "alice"})).unwrap();
        let views = facade.list_issues(&filter).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].reference, 1);
        match &views[0].details {
            ItemDetails::Issue { severity, .. } => assert_eq!(severity.as_deref(), Some("Critical")),
            other => panic!("unexpected {:?}", other),
        }

        let err = facade
            .list_issues(&ListFilter::new().with_status("Reopened"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownLookupValue { .. }));
    }

    #[tokio::test]
    async fn test_stories_by_epic() {
        let (transport, facade) = fixtures::facade();
        transport
            .respond(Method::Get, "epics?project=1", json!([{"id": 800, "ref": 1}]))
            .respond(Method::Get, "epics/800/related_userstories", json!([{"user_story": 401}]))
            .respond(
                Method::Get,
                "userstories?project=1",
                json!([{"id": 400, "ref": 10}, {"id": 401, "ref": 11}]),
            );

        let views = facade.list_stories(&ListFilter::new().with_epic(1)).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].reference, 11);

        let err = facade
            .list_tasks(&ListFilter::new().with_epic(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_get_unknown_ref() {
        let (transport, facade) = fixtures::facade();
        transport.respond(Method::Get, "epics?project=1", json!([{"id": 800, "ref": 1}]));

        let err = facade.get_epic(2).await.unwrap_err();
        assert_eq!(err.to_string(), "epic #2 not found in the active project");
        assert!(!err.to_string().contains("800"));
    }

    #[tokio::test]
    async fn test_create_with_secondary_failures_still_succeeds() {
        let (transport, facade) = fixtures::facade();
        transport
            .respond(Method::Get, "epics?project=1", json!([{"id": 800, "ref": 1}]))
            .respond(
                Method::Post,
                "userstories",
                json!({"id": 400, "ref": 12, "subject": "Login", "version": 1, "status": 11}),
            )
            .respond(Method::Get, "userstories/400", json!({"id": 400, "ref": 12, "subject": "Login", "version": 1, "epics": []}))
            .fail(Method::Post, "epics/800/related_userstories", 500, "boom")
            .fail(Method::Patch, "userstories/400", 500, "boom");

        let view = facade
            .create_story(body(json!({"subject": "Login", "epics": [1], "comment": "hi", "ref": 99})))
            .await
            .unwrap();
        assert_eq!(view.reference, 12);

        let post = &transport.calls_to(Method::Post, "userstories")[0];
        let sent = post.body.as_ref().unwrap();
        assert_eq!(sent["project"], json!(1));
        assert!(sent.get("ref").is_none());
        assert!(sent.get("epics").is_none());
        assert!(sent.get("comment").is_none());
    }

    #[tokio::test]
    async fn test_create_requires_subject() {
        let (transport, facade) = fixtures::facade();
        let err = facade.create_task(body(json!({"status": "New"}))).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput(_)));
        assert!(transport.calls_to(Method::Post, "tasks").is_empty());
    }

    #[tokio::test]
    async fn test_update_refreshes_version_and_maps_conflict() {
        let (transport, facade) = fixtures::facade();
        transport
            .respond(Method::Get, "tasks?project=1", json!([{"id": 500, "ref": 4}]))
            .respond(Method::Get, "tasks/500", json!({"id": 500, "ref": 4, "version": 7}))
            .respond(
                Method::Patch,
                "tasks/500",
                json!({"id": 500, "ref": 4, "version": 8, "subject": "Renamed", "status": 32}),
            );

        let view = facade
            .update_task(4, body(json!({"subject": "Renamed", "status": "closed"})))
            .await
            .unwrap();
        assert!(view.is_closed);
        assert_eq!(view.version, Some(8));
        let patch = &transport.calls_to(Method::Patch, "tasks/500")[0];
        assert_eq!(
            patch.body,
            Some(json!({"subject": "Renamed", "status": 32, "version": 7}))
        );

        transport.fail(Method::Patch, "tasks/500", 412, "");
        let err = facade
            .update_task(4, body(json!({"subject": "Again", "version": 7})))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::VersionConflict { kind: EntityKind::Task, .. }));
        assert!(err.is_retryable());
        // explicit version skips the refresh
        assert_eq!(transport.calls_to(Method::Get, "tasks/500").len(), 1);
    }

    #[tokio::test]
    async fn test_update_survives_failed_reread() {
        let (transport, facade) = fixtures::facade();
        transport
            .respond(Method::Get, "userstories?project=1", json!([{"id": 400, "ref": 12}]))
            .respond(Method::Get, "epics?project=1", json!([{"id": 800, "ref": 1}]))
            .respond(Method::Get, "epics/800/related_userstories", json!([]))
            .respond(Method::Post, "epics/800/related_userstories", json!({}))
            .respond(
                Method::Patch,
                "userstories/400",
                json!({"id": 400, "ref": 12, "version": 4, "subject": "Renamed"}),
            )
            .fail(Method::Get, "userstories/400", 500, "boom");

        let view = facade
            .update_story(12, body(json!({"subject": "Renamed", "epics": [1], "version": 3})))
            .await
            .unwrap();
        assert_eq!(view.subject, "Renamed");
        assert_eq!(view.version, Some(4));
        assert_eq!(transport.calls_to(Method::Patch, "userstories/400").len(), 1);
        assert_eq!(transport.calls_to(Method::Post, "epics/800").len(), 1);
    }

    #[tokio::test]
    async fn test_update_resolution_failure_sends_nothing() {
        let (transport, facade) = fixtures::facade();
        transport.respond(Method::Get, "userstories?project=1", json!([{"id": 400, "ref": 12}]));

        let err = facade
            .update_story(12, body(json!({"subject": "x", "assigned_to": "nobody"})))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownUser(_)));
        assert!(transport.calls_to(Method::Patch, "").is_empty());
    }

    #[tokio::test]
    async fn test_update_with_nothing_to_do() {
        let (_transport, facade) = fixtures::facade();
        let err = facade
            .update_issue(1, body(json!({"id": 3, "is_closed": true})))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidInput(_)));
    }
}
