//! Comments
//!
//! Comments are not stored on their own: they are read back from the history
//! feed of their parent and written as a `{comment, version}` patch of it.

use futures::FutureExt;
use serde_json::{json, Value};

use super::{ensure_work_item, Facade};
use crate::fallback::FallbackChain;
use crate::model::{CommentView, EntityKind, WorkItemView};
use crate::normalize::{comments_from_history, comments_from_timeline};
use crate::transport::Method;
use crate::{BridgeError, Result};

impl Facade {
    /// Comments on the entity of `kind` with `reference`, oldest first
    pub async fn list_comments(&self, kind: EntityKind, reference: i64) -> Result<Vec<CommentView>> {
        ensure_work_item(kind)?;
        let id = self.resolver.require_id_by_ref(kind, reference).await?;

        match kind.history_key() {
            Some(key) => {
                let history = self
                    .request(Method::Get, &format!("history/{}/{}", key, id), None)
                    .await?;
                Ok(comments_from_history(&history))
            }
            None => Ok(self.epic_comments(id, reference).await),
        }
    }

    /// Epics have no documented history feed: try the per-epic path, then the
    /// project timeline. Empty when both fail.
    async fn epic_comments(&self, epic_id: i64, epic_ref: i64) -> Vec<CommentView> {
        let timeline_path = format!("timeline/project/{}", self.project.id);
        let chain = FallbackChain::new("epic comments")
            .attempt("epic history", move || {
                async move {
                    let history = self
                        .request(Method::Get, &format!("history/epic/{}", epic_id), None)
                        .await?;
                    Ok(history.is_array().then(|| comments_from_history(&history)))
                }
                .boxed()
            })
            .attempt("project timeline", move || {
                async move {
                    let timeline = self.request(Method::Get, &timeline_path, None).await?;
                    Ok(timeline
                        .is_array()
                        .then(|| comments_from_timeline(&timeline, epic_id, Some(epic_ref))))
                }
                .boxed()
            });

        chain
            .run()
            .await
            .map(|(_, comments)| comments)
            .unwrap_or_default()
    }

    /// Post `text` on an entity whose id is already known, refreshing its
    /// version right before the patch
    pub(crate) async fn post_comment(
        &self,
        kind: EntityKind,
        id: i64,
        reference: i64,
        text: &str,
    ) -> Result<Value> {
        let mut body = json!({ "comment": text });
        if let Some(version) = self.current_version(kind, id, reference).await? {
            body["version"] = Value::from(version);
        }
        let path = format!("{}/{}", kind.endpoint(), id);
        self.transport
            .request(Method::Patch, &path, Some(&body))
            .await
            .map_err(|e| BridgeError::from_write(e, kind, reference))
    }

    /// Add a comment to the entity of `kind` with `reference`
    pub async fn add_comment(&self, kind: EntityKind, reference: i64, text: &str) -> Result<WorkItemView> {
        ensure_work_item(kind)?;
        if text.trim().is_empty() {
            return Err(BridgeError::InvalidInput("comment text is empty".into()));
        }
        let id = self.resolver.require_id_by_ref(kind, reference).await?;
        let raw = self.post_comment(kind, id, reference, text).await?;
        let raw = if raw.get("id").is_some() {
            raw
        } else {
            self.fetch(kind, id, reference).await?
        };
        self.resolver.prepare_views(kind).await;
        self.view(kind, &raw)
    }
}
