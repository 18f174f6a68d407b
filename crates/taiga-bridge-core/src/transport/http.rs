use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

use super::{Method, Transport};
use crate::config::BridgeConfig;
use crate::error::HttpError;
use crate::{BridgeError, Result};

const PAGINATION_HEADER: &str = "x-disable-pagination";

/// [`Transport`] over HTTPS with `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| BridgeError::Config(format!("user_agent: {}", e)))?,
        );
        if let Some(token) = &config.auth_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| BridgeError::Config(format!("auth_token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        if config.disable_pagination {
            headers.insert(PAGINATION_HEADER, HeaderValue::from_static("True"));
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BridgeError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> std::result::Result<Value, HttpError> {
        let url = self.endpoint(path);
        let mut builder = match method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
            Method::Patch => self.http_client.patch(&url),
            Method::Delete => self.http_client.delete(&url),
        };
        if let Some(body) = body {
            builder = builder.json(body);
        }

        tracing::debug!("{} {}", method, path);
        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HttpError::new(status.as_u16(), e.to_string()))?;

        if !status.is_success() {
            tracing::debug!("{} {} failed with {}", method, path, status);
            return Err(HttpError::new(status.as_u16(), text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            HttpError::new(status.as_u16(), format!("invalid JSON response: {}", e))
        })
    }
}
