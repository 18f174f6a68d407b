//! In-memory transport with canned routes, for tests and offline dry runs.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;

use super::{Method, Transport};
use crate::error::HttpError;

type Handler = Arc<dyn Fn(&str, Option<&Value>) -> Result<Value, HttpError> + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

impl Route {
    /// Exact match scores 2; a query-less route matching the path part scores 1.
    fn score(&self, method: Method, path: &str) -> u8 {
        if self.method != method {
            return 0;
        }
        if self.path == path {
            return 2;
        }
        let bare = path.split('?').next().unwrap_or(path);
        if !self.path.contains('?') && self.path == bare {
            return 1;
        }
        0
    }
}

/// A call seen by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Routes `(method, path)` pairs to canned responses and records every call.
///
/// A route registered without a query string also matches requests whose path
/// carries one, unless a more specific route exists. Later registrations win
/// over earlier ones of equal specificity. Unrouted calls fail with 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: RwLock<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("routes", &self.routes.read().len())
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` with `value`
    pub fn respond(&self, method: Method, path: &str, value: Value) -> &Self {
        self.handle(method, path, move |_, _| Ok(value.clone()))
    }

    /// Answer `method path` with an HTTP error
    pub fn fail(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        let err = HttpError::new(status, body);
        self.handle(method, path, move |_, _| Err(err.clone()))
    }

    /// Answer `method path` with a closure over the request path and body
    pub fn handle<F>(&self, method: Method, path: &str, handler: F) -> &Self
    where
        F: Fn(&str, Option<&Value>) -> Result<Value, HttpError> + Send + Sync + 'static,
    {
        self.routes.write().push(Route {
            method,
            path: path.trim_start_matches('/').to_string(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Calls with `method` whose path starts with `prefix`
    pub fn calls_to(&self, method: Method, prefix: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method && c.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn find(&self, method: Method, path: &str) -> Option<Handler> {
        let routes = self.routes.read();
        let mut best: Option<(u8, &Route)> = None;
        for route in routes.iter() {
            let score = route.score(method, path);
            if score > 0 && best.map_or(true, |(s, _)| score >= s) {
                best = Some((score, route));
            }
        }
        best.map(|(_, route)| Arc::clone(&route.handler))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, HttpError> {
        let path = path.trim_start_matches('/');
        self.calls.lock().push(RecordedCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        match self.find(method, path) {
            Some(handler) => handler(path, body),
            None => Err(HttpError::new(404, format!("no route for {} {}", method, path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_route_specificity() {
        let transport = ScriptedTransport::new();
        transport
            .respond(Method::Get, "users", json!(["any"]))
            .respond(Method::Get, "users?username=alice", json!(["alice"]));

        let exact = transport
            .request(Method::Get, "users?username=alice", None)
            .await
            .unwrap();
        assert_eq!(exact, json!(["alice"]));

        let loose = transport
            .request(Method::Get, "/users?q=bo", None)
            .await
            .unwrap();
        assert_eq!(loose, json!(["any"]));

        let missing = transport.request(Method::Post, "users", None).await;
        assert_eq!(missing.unwrap_err().status, 404);
        assert_eq!(transport.calls().len(), 3);
        assert_eq!(transport.calls_to(Method::Get, "users").len(), 2);
    }

    #[test]
    fn test_later_route_wins() {
        let transport = ScriptedTransport::new();
        transport
            .respond(Method::Get, "epics", json!([1]))
            .fail(Method::Get, "epics", 500, "down");

        let result = tokio_test::block_on(transport.request(Method::Get, "epics", None));
        assert_eq!(result.unwrap_err().status, 500);
    }
}
