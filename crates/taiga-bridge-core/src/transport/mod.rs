//! Transport seam between the facade and the backend
//!
//! The facade composes paths (including query strings) and hands them to a
//! [`Transport`]; the transport performs exactly one HTTP call and returns the
//! parsed JSON body or an [`HttpError`].

mod http;
mod scripted;

pub use http::HttpTransport;
pub use scripted::{RecordedCall, ScriptedTransport};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use url::form_urlencoded;

use crate::error::HttpError;

/// HTTP verbs used against the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(verb)
    }
}

/// One backend call
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `method` on `path` (relative to the API root, query included)
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, HttpError>;
}

/// Path plus percent-encoded query parameters
#[derive(Debug, Clone, Default)]
pub struct Query {
    path: String,
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn param_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    pub fn build(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        format!("{}?{}", self.path, encoded)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_encoding() {
        let query = Query::new("users")
            .param("project", 3)
            .param("q", "ann marie&co")
            .param_opt("username", None::<&str>);
        assert_eq!(query.build(), "users?project=3&q=ann+marie%26co");
        assert_eq!(Query::new("epics").build(), "epics");
    }
}
