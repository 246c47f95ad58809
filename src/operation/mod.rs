//! operation
//!
//! Authenticated POST calls to a sibling service on the same host.
//!
//! The host name (`HTTP_HOST`) and bearer token (`SITE_RESTRICTED_TOKEN`) are
//! read from the [`Environment`] on every call, and every call builds a fresh
//! HTTP client. Any non-2xx status is an error; nothing is retried.
//!
//! # Example
//!
//! ```ignore
//! use pushgate::operation::OperationClient;
//!
//! let client = OperationClient::from_process_env();
//! client.post_json("/api/swap", &serde_json::json!({ "slot": "production" })).await?;
//! ```

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::core::env::{Environment, ProcessEnvironment, HTTP_HOST_VAR, SITE_TOKEN_VAR};

const USER_AGENT_VALUE: &str = concat!("pushgate/", env!("CARGO_PKG_VERSION"));

/// Errors from operation calls.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A required environment value is missing.
    #[error("missing configuration: {0} is not set")]
    MissingConfig(&'static str),

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("POST {path} failed with HTTP {status}")]
    Status {
        /// Request path
        path: String,
        /// HTTP status code
        status: u16,
    },
}

/// Client for authenticated operations on the sibling service.
#[derive(Clone)]
pub struct OperationClient {
    env: Arc<dyn Environment>,
    scheme: String,
}

impl std::fmt::Debug for OperationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationClient")
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl OperationClient {
    /// Client reading host and token from `env`.
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self {
            env,
            scheme: "https".to_string(),
        }
    }

    /// Client reading host and token from the process environment.
    pub fn from_process_env() -> Self {
        Self::new(Arc::new(ProcessEnvironment))
    }

    /// Use a scheme other than `https`.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// POST with a JSON `null` body.
    pub async fn post(&self, path: &str) -> Result<Response, OperationError> {
        self.post_json(path, &()).await
    }

    /// POST `content` as JSON.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        content: &T,
    ) -> Result<Response, OperationError> {
        let span = tracing::info_span!("operation", name = %format!("POST {}", path));
        self.send(path, content).instrument(span).await
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        path: &str,
        content: &T,
    ) -> Result<Response, OperationError> {
        let host = self
            .env
            .var(HTTP_HOST_VAR)
            .ok_or(OperationError::MissingConfig(HTTP_HOST_VAR))?;
        let token = self
            .env
            .var(SITE_TOKEN_VAR)
            .ok_or(OperationError::MissingConfig(SITE_TOKEN_VAR))?;

        let url = format!(
            "{}://{}/{}",
            self.scheme,
            host.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| OperationError::MissingConfig(SITE_TOKEN_VAR))?;

        let client = Client::new();
        let response = client
            .post(&url)
            .header(AUTHORIZATION, auth)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .json(content)
            .send()
            .await
            .map_err(|e| OperationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "operation failed");
            return Err(OperationError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        tracing::debug!(status = status.as_u16(), "operation succeeded");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn user_agent_carries_version() {
        assert!(USER_AGENT_VALUE.starts_with("pushgate/"));
        assert!(USER_AGENT_VALUE.len() > "pushgate/".len());
    }

    #[tokio::test]
    async fn missing_host_fails_before_network() {
        let mut env = HashMap::new();
        env.insert(SITE_TOKEN_VAR.to_string(), "token".to_string());
        let client = OperationClient::new(Arc::new(env));

        let err = client.post("/api/ping").await.unwrap_err();
        assert!(matches!(err, OperationError::MissingConfig(HTTP_HOST_VAR)));
    }

    #[tokio::test]
    async fn missing_token_fails_before_network() {
        let mut env = HashMap::new();
        env.insert(HTTP_HOST_VAR.to_string(), "localhost:1".to_string());
        let client = OperationClient::new(Arc::new(env));

        let err = client.post("/api/ping").await.unwrap_err();
        assert!(matches!(err, OperationError::MissingConfig(SITE_TOKEN_VAR)));
    }
}
