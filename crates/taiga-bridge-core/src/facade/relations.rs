//! Epic <-> story links
//!
//! Links live in the `epics/{epic}/related_userstories` sub-resource, not on
//! either entity. Syncing a story's epic set issues one independent call per
//! added or removed link; nothing is rolled back when a call fails.

use futures::FutureExt;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::write::{parse_refs, EpicTarget};
use super::Facade;
use crate::error::FailedStep;
use crate::fallback::FallbackChain;
use crate::model::{EntityKind, EpicLinkView};
use crate::transport::Method;
use crate::{BridgeError, Result};

fn related_path(epic_id: i64) -> String {
    format!("epics/{}/related_userstories", epic_id)
}

fn story_id_of(link: &Value) -> Option<i64> {
    let story = link.get("user_story")?;
    story
        .as_i64()
        .or_else(|| story.get("id").and_then(Value::as_i64))
}

fn epic_links(epics: &[Value]) -> Vec<EpicLinkView> {
    epics
        .iter()
        .filter_map(|epic| {
            Some(EpicLinkView {
                id: epic.get("id").and_then(Value::as_i64)?,
                reference: epic.get("ref").and_then(Value::as_i64),
                subject: epic
                    .get("subject")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}

impl Facade {
    /// Ids of the stories linked to an epic
    pub(crate) async fn related_story_ids(&self, epic_id: i64) -> Result<Vec<i64>> {
        let links = self.request(Method::Get, &related_path(epic_id), None).await?;
        Ok(links
            .as_array()
            .map(|links| links.iter().filter_map(story_id_of).collect())
            .unwrap_or_default())
    }

    async fn link_ids(&self, epic_id: i64, story_id: i64) -> Result<()> {
        let body = json!({"epic": epic_id, "user_story": story_id});
        self.request(Method::Post, &related_path(epic_id), Some(&body))
            .await?;
        Ok(())
    }

    async fn unlink_ids(&self, epic_id: i64, story_id: i64) -> Result<()> {
        let path = format!("{}/{}", related_path(epic_id), story_id);
        self.request(Method::Delete, &path, None).await?;
        Ok(())
    }

    async fn link_pair(&self, epic_ref: i64, story_ref: i64) -> Result<(i64, i64)> {
        let epic_id = self
            .resolver
            .require_id_by_ref(EntityKind::Epic, epic_ref)
            .await?;
        let story_id = self
            .resolver
            .require_id_by_ref(EntityKind::Story, story_ref)
            .await?;
        Ok((epic_id, story_id))
    }

    /// Link a story to an epic
    pub async fn link_epic_story(&self, epic_ref: i64, story_ref: i64) -> Result<()> {
        let (epic_id, story_id) = self.link_pair(epic_ref, story_ref).await?;
        self.link_ids(epic_id, story_id).await
    }

    /// Remove the link between a story and an epic
    pub async fn unlink_epic_story(&self, epic_ref: i64, story_ref: i64) -> Result<()> {
        let (epic_id, story_id) = self.link_pair(epic_ref, story_ref).await?;
        self.unlink_ids(epic_id, story_id).await
    }

    /// Epics currently linked to a story.
    ///
    /// Reads the story detail's `epics` field; backends that omit it are
    /// answered by scanning every epic's related stories.
    pub(crate) async fn epics_of_story(&self, story_id: i64, story_ref: i64) -> Result<Vec<EpicLinkView>> {
        let chain = FallbackChain::new("story epics")
            .attempt("story detail", move || {
                async move {
                    let story = self.fetch(EntityKind::Story, story_id, story_ref).await?;
                    Ok(story.get("epics").and_then(Value::as_array).map(|e| epic_links(e)))
                }
                .boxed()
            })
            .attempt("epic scan", move || {
                async move {
                    let epics = self.resolver.list_raw(EntityKind::Epic).await?;
                    let mut linked = Vec::new();
                    for epic in epics {
                        let Some(epic_id) = epic.get("id").and_then(Value::as_i64) else {
                            continue;
                        };
                        if self.related_story_ids(epic_id).await?.contains(&story_id) {
                            linked.push(epic);
                        }
                    }
                    Ok(Some(epic_links(&linked)))
                }
                .boxed()
            });

        chain.run().await.map(|(_, links)| links).ok_or_else(|| {
            BridgeError::UnexpectedResponse(format!(
                "could not read the epics of user story #{}",
                story_ref
            ))
        })
    }

    /// Epics linked to the story with `story_ref`
    pub async fn story_epics(&self, story_ref: i64) -> Result<Vec<EpicLinkView>> {
        let story_id = self
            .resolver
            .require_id_by_ref(EntityKind::Story, story_ref)
            .await?;
        self.epics_of_story(story_id, story_ref).await
    }

    /// Diff the story's links against `desired` and link/unlink the difference.
    ///
    /// Each call is independent; when some fail the result is a
    /// [`BridgeError::PartialCompositeFailure`] listing applied and failed steps.
    pub(crate) async fn sync_story_epics(
        &self,
        story_id: i64,
        story_ref: i64,
        desired: &[EpicTarget],
    ) -> Result<()> {
        let current = self.epics_of_story(story_id, story_ref).await?;

        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for target in desired {
            if current.iter().any(|link| link.id == target.id) {
                continue;
            }
            let step = format!("link epic #{}", target.reference);
            match self.link_ids(target.id, story_id).await {
                Ok(()) => applied.push(step),
                Err(e) => failed.push(FailedStep {
                    step,
                    reason: e.to_string(),
                }),
            }
        }

        let epic_refs = self.epic_ref_index(&current).await;
        for link in &current {
            if desired.iter().any(|target| target.id == link.id) {
                continue;
            }
            let step = match link.reference.or_else(|| epic_refs.get(&link.id).copied()) {
                Some(reference) => format!("unlink epic #{}", reference),
                None => "unlink epic".to_string(),
            };
            match self.unlink_ids(link.id, story_id).await {
                Ok(()) => applied.push(step),
                Err(e) => failed.push(FailedStep {
                    step,
                    reason: e.to_string(),
                }),
            }
        }

        if failed.is_empty() {
            if !applied.is_empty() {
                tracing::debug!("Synced epics of user story #{}: {:?}", story_ref, applied);
            }
            Ok(())
        } else {
            Err(BridgeError::PartialCompositeFailure {
                operation: format!("set epics of user story #{}", story_ref),
                applied,
                failed,
            })
        }
    }

    /// Id -> ref for links whose payload omitted the ref
    async fn epic_ref_index(&self, links: &[EpicLinkView]) -> HashMap<i64, i64> {
        if links.iter().all(|link| link.reference.is_some()) {
            return HashMap::new();
        }
        match self.resolver.list_raw(EntityKind::Epic).await {
            Ok(epics) => epics
                .iter()
                .filter_map(|epic| {
                    Some((
                        epic.get("id").and_then(Value::as_i64)?,
                        epic.get("ref").and_then(Value::as_i64)?,
                    ))
                })
                .collect(),
            Err(e) => {
                tracing::debug!("Epic listing for link names failed: {}", e);
                HashMap::new()
            }
        }
    }

    /// Make `epic_refs` the exact set of epics the story is linked to
    pub async fn set_story_epics(&self, story_ref: i64, epic_refs: &[i64]) -> Result<Vec<EpicLinkView>> {
        let desired = self.resolve_epic_targets(epic_refs).await?;
        let story_id = self
            .resolver
            .require_id_by_ref(EntityKind::Story, story_ref)
            .await?;
        self.sync_story_epics(story_id, story_ref, &desired).await?;
        self.epics_of_story(story_id, story_ref).await
    }

    /// [`set_story_epics`](Self::set_story_epics) with the refs given as JSON
    pub async fn set_story_epics_value(&self, story_ref: i64, epic_refs: &Value) -> Result<Vec<EpicLinkView>> {
        let refs = parse_refs(epic_refs)?;
        self.set_story_epics(story_ref, &refs).await
    }
}
