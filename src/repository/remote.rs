//! repository::remote
//!
//! HTTP client for a remote repository API.
//!
//! Every call is a single request followed by a success check before the body
//! is read; any non-success status becomes an error. No retries.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Repository, RepositoryError};
use crate::core::types::{Branch, ChangeSet, ChangeSetDetail, FileStatus};

/// Basic-auth credentials for the remote API.
#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: Option<String>,
}

/// Client for the scm routes of a remote pushgate server.
#[derive(Debug, Clone)]
pub struct RemoteRepository {
    client: Client,
    base: Url,
    credentials: Option<Credentials>,
}

#[derive(Serialize)]
struct PathBody<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct CommitBody<'a> {
    name: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    id: &'a str,
}

impl RemoteRepository {
    /// Create a client for the API rooted at `service_url`.
    ///
    /// Relative operation paths are resolved against the URL, so a missing
    /// trailing slash is added.
    pub fn new(service_url: &str) -> Result<Self, RepositoryError> {
        let mut base = Url::parse(service_url)
            .map_err(|e| RepositoryError::Network(format!("invalid url '{}': {}", service_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
            credentials: None,
        })
    }

    /// Send basic-auth credentials with every request.
    pub fn with_credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password,
        });
        self
    }

    /// The resolved base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, RepositoryError> {
        self.base
            .join(path)
            .map_err(|e| RepositoryError::Network(format!("invalid path '{}': {}", path, e)))
    }

    /// `details/{id}` with `id` escaped as a single path segment.
    fn details_url(&self, id: &str) -> Result<Url, RepositoryError> {
        if matches!(id, "" | "." | "..") {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RepositoryError::Network(format!("cannot extend url '{}'", self.base)))?
            .pop_if_empty()
            .push("details")
            .push(id);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, c.password.as_deref()),
            None => request,
        }
    }

    async fn get(&self, path: &str) -> Result<Response, RepositoryError> {
        self.get_url(self.url(path)?, path).await
    }

    async fn get_url(&self, url: Url, path: &str) -> Result<Response, RepositoryError> {
        let request = self.authorize(self.client.get(url));
        let response = request
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;
        ensure_success(response, path).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RepositoryError> {
        let response = self.get(path).await?;
        response
            .json()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn post_empty(&self, path: &str) -> Result<Response, RepositoryError> {
        let request = self.authorize(self.client.post(self.url(path)?)).body("");
        let response = request
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;
        ensure_success(response, path).await
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, RepositoryError> {
        let request = self.authorize(self.client.post(self.url(path)?)).json(body);
        let response = request
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;
        ensure_success(response, path).await
    }
}

/// Turn any non-success status into an error before the body is touched.
async fn ensure_success(response: Response, path: &str) -> Result<Response, RepositoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(path, status = status.as_u16(), "remote repository call failed");

    Err(match status {
        StatusCode::NOT_FOUND => RepositoryError::NotFound(if body.is_empty() {
            path.to_string()
        } else {
            body
        }),
        _ => RepositoryError::Http {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            },
        },
    })
}

#[async_trait]
impl Repository for RemoteRepository {
    async fn current_id(&self) -> Result<Option<String>, RepositoryError> {
        let text = self
            .get("id")
            .await?
            .text()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let id = text.trim();
        Ok((!id.is_empty()).then(|| id.to_string()))
    }

    async fn initialize(&self) -> Result<(), RepositoryError> {
        self.post_empty("init").await.map(drop)
    }

    async fn branches(&self) -> Result<Vec<Branch>, RepositoryError> {
        self.get_json("branches").await
    }

    async fn status(&self) -> Result<Vec<FileStatus>, RepositoryError> {
        self.get_json("status").await
    }

    async fn changes(&self) -> Result<Vec<ChangeSet>, RepositoryError> {
        self.get_json("log").await
    }

    async fn changes_page(
        &self,
        index: usize,
        limit: usize,
    ) -> Result<Vec<ChangeSet>, RepositoryError> {
        self.get_json(&format!("log?index={}&limit={}", index, limit))
            .await
    }

    async fn details(&self, id: &str) -> Result<ChangeSetDetail, RepositoryError> {
        let url = self.details_url(id)?;
        let response = self.get_url(url, &format!("details/{}", id)).await?;
        response
            .json()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn working_changes(&self) -> Result<Option<ChangeSetDetail>, RepositoryError> {
        self.get_json("working").await
    }

    async fn add_file(&self, path: &str) -> Result<(), RepositoryError> {
        self.post_json("add", &PathBody { path }).await.map(drop)
    }

    async fn revert_file(&self, path: &str) -> Result<(), RepositoryError> {
        self.post_json("remove", &PathBody { path }).await.map(drop)
    }

    async fn commit(
        &self,
        author_name: &str,
        message: &str,
    ) -> Result<Option<ChangeSet>, RepositoryError> {
        let response = self
            .post_json(
                "commit",
                &CommitBody {
                    name: author_name,
                    message,
                },
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn push(&self) -> Result<(), RepositoryError> {
        self.post_empty("push").await.map(drop)
    }

    async fn update(&self, id: &str) -> Result<(), RepositoryError> {
        self.post_json("update", &UpdateBody { id }).await.map(drop)
    }
}
