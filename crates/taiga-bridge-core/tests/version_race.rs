//! Concurrent updates against a backend that enforces optimistic versions.
//!
//! Whatever the interleaving, every update either lands on the version it read
//! or surfaces a VersionConflict; no write is ever silently overwritten.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use taiga_bridge_core::{
    BridgeError, EntityKind, Facade, HttpError, Method, ScriptedTransport, Transport,
};

/// Yields to the scheduler before every call so concurrent operations interleave
struct YieldingTransport {
    inner: Arc<ScriptedTransport>,
}

#[async_trait]
impl Transport for YieldingTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, HttpError> {
        tokio::task::yield_now().await;
        self.inner.request(method, path, body).await
    }
}

#[derive(Debug)]
struct StoredStory {
    version: i64,
    subject: String,
    /// Subjects of every accepted write, in order
    accepted: Vec<String>,
}

impl StoredStory {
    fn to_json(&self) -> Value {
        json!({"id": 400, "ref": 12, "subject": self.subject, "version": self.version})
    }
}

fn project() -> Value {
    json!({"id": 1, "slug": "demo", "name": "Demo", "us_statuses": [{"id": 11, "name": "New"}]})
}

/// Story 400 (ref 12) stored behind a version check; `on_read` runs after every
/// detail read, before its response is returned
fn backend<F>(on_read: F) -> (Arc<ScriptedTransport>, Arc<Mutex<StoredStory>>)
where
    F: Fn(&mut StoredStory) + Send + Sync + 'static,
{
    let store = Arc::new(Mutex::new(StoredStory {
        version: 1,
        subject: "Original".into(),
        accepted: Vec::new(),
    }));
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(
        Method::Get,
        "userstories?project=1",
        json!([{"id": 400, "ref": 12}]),
    );

    let read_store = Arc::clone(&store);
    transport.handle(Method::Get, "userstories/400", move |_, _| {
        let mut story = read_store.lock();
        let snapshot = story.to_json();
        on_read(&mut story);
        Ok(snapshot)
    });

    let write_store = Arc::clone(&store);
    transport.handle(Method::Patch, "userstories/400", move |_, body| {
        let body = body.cloned().unwrap_or(Value::Null);
        let mut story = write_store.lock();
        if body.get("version").and_then(Value::as_i64) != Some(story.version) {
            return Err(HttpError::new(
                400,
                r#"{"version": ["The version doesn't match with the current one"]}"#,
            ));
        }
        if let Some(subject) = body.get("subject").and_then(Value::as_str) {
            story.subject = subject.to_string();
            story.accepted.push(subject.to_string());
        }
        story.version += 1;
        Ok(story.to_json())
    });

    (transport, store)
}

fn rename(subject: &str) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert("subject".into(), Value::from(subject));
    patch
}

#[tokio::test]
async fn test_external_write_between_refresh_and_patch_is_a_conflict() {
    let (transport, store) = backend(|story| {
        // another actor edits right after our refresh
        story.subject = "External".into();
        story.version += 1;
    });
    let facade = Facade::from_project(transport.clone(), project()).unwrap();

    let err = facade.update_story(12, rename("Mine")).await.unwrap_err();

    match &err {
        BridgeError::VersionConflict { kind, reference } => {
            assert_eq!(*kind, EntityKind::Story);
            assert_eq!(reference, "12");
        }
        other => panic!("expected a version conflict, got {:?}", other),
    }
    assert!(err.is_retryable());
    let story = store.lock();
    assert_eq!(story.subject, "External");
    assert!(story.accepted.is_empty());
    // no automatic retry
    assert_eq!(transport.calls_to(Method::Patch, "userstories/400").len(), 1);
}

#[tokio::test]
async fn test_racing_updates_never_overwrite_silently() {
    let (scripted, store) = backend(|_| {});
    let transport = Arc::new(YieldingTransport {
        inner: Arc::clone(&scripted),
    });
    let facade = Facade::from_project(transport, project()).unwrap();

    let (first, second) = tokio::join!(
        facade.update_story(12, rename("First")),
        facade.update_story(12, rename("Second")),
    );

    let mut winners = Vec::new();
    for (subject, outcome) in [("First", first), ("Second", second)] {
        match outcome {
            Ok(view) => {
                assert_eq!(view.subject, subject);
                winners.push(subject.to_string());
            }
            Err(BridgeError::VersionConflict { .. }) => {}
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    let story = store.lock();
    assert!(!winners.is_empty());
    assert_eq!(story.version, 1 + winners.len() as i64);
    assert_eq!(story.accepted.last(), Some(&story.subject));
    let mut accepted = story.accepted.clone();
    accepted.sort();
    winners.sort();
    assert_eq!(accepted, winners);
}

#[tokio::test]
async fn test_sequential_updates_both_succeed() {
    let (transport, store) = backend(|_| {});
    let facade = Facade::from_project(transport, project()).unwrap();

    facade.update_story(12, rename("One")).await.unwrap();
    let view = facade.update_story(12, rename("Two")).await.unwrap();

    assert_eq!(view.version, Some(3));
    assert_eq!(store.lock().accepted, vec!["One", "Two"]);
}
