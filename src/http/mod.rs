//! http
//!
//! axum router hosting one site.
//!
//! Routes:
//! - `GET  /{site}/info/refs?service=git-receive-pack` - Ref advertisement
//! - `POST /{site}/git-receive-pack` - Push endpoint
//! - `GET  /{site}/deployments` - Deployment records, newest first
//! - `/{site}/scm/...` - Repository API (see [`scm`])
//!
//! Requests for any other site name answer `404`.

mod channel;
mod scm;

pub use channel::{BodyReceiver, ChannelResponse, ChannelWriter};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::TryStreamExt;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, error, info, instrument};

use crate::core::ops::{DeploymentLock, LockError, OperationLock};
use crate::core::paths::SitePaths;
use crate::deploy::{AutoSwapMarker, DeploymentError, DeploymentManager, FileDeploymentStore};
use crate::gateway::{BufferedResponse, GatewayError, ReceivePackGateway, ResponseHead};
use crate::git::{GitCli, GitRepository, SiteRepositoryFactory};
use crate::repository::{Repository, RepositoryError};

/// Body chunks buffered between git and a slow client.
const BODY_CHANNEL_CAPACITY: usize = 16;

const RECEIVE_PACK_SERVICE: &str = "git-receive-pack";

/// Shared state for one site.
#[derive(Clone)]
pub struct AppState {
    site: String,
    gateway: ReceivePackGateway,
    repository: Arc<dyn Repository>,
    deployments: Arc<dyn DeploymentManager>,
}

impl AppState {
    pub fn new(
        site: impl Into<String>,
        gateway: ReceivePackGateway,
        repository: Arc<dyn Repository>,
        deployments: Arc<dyn DeploymentManager>,
    ) -> Self {
        Self {
            site: site.into(),
            gateway,
            repository,
            deployments,
        }
    }

    /// Production wiring for a site rooted at `paths`.
    pub fn for_site(
        site: impl Into<String>,
        paths: &SitePaths,
        git_binary: impl Into<PathBuf>,
        auto_swap_slot: Option<String>,
    ) -> Self {
        let repository_dir = paths.repository_dir();
        let store = Arc::new(FileDeploymentStore::new(paths.deployments_dir()));
        let lock: Arc<dyn OperationLock> =
            Arc::new(DeploymentLock::new(paths.deployment_lock_path()));

        let gateway = ReceivePackGateway::new(
            Arc::new(SiteRepositoryFactory::new(&repository_dir)),
            lock,
            Arc::new(AutoSwapMarker::new(
                paths.auto_swap_marker_path(),
                auto_swap_slot,
            )),
            store.clone(),
            Arc::new(GitCli::new(&repository_dir, git_binary)),
        );

        Self::new(
            site,
            gateway,
            Arc::new(GitRepository::new(repository_dir)),
            store,
        )
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    fn lock(&self) -> &dyn OperationLock {
        self.gateway.lock().as_ref()
    }

    fn check_site(&self, site: &str) -> Result<(), ApiError> {
        if site == self.site {
            Ok(())
        } else {
            Err(ApiError::UnknownSite(site.to_string()))
        }
    }
}

/// Build the router for `state`'s site.
pub fn router(state: AppState) -> Router {
    let state = Arc::new(state);
    Router::new()
        // Git smart HTTP endpoints
        .route("/{site}/info/refs", get(handle_info_refs))
        .route("/{site}/git-receive-pack", post(handle_receive_pack))
        .route("/{site}/deployments", get(handle_deployments))
        // Repository API
        .route("/{site}/scm/id", get(scm::current_id))
        .route("/{site}/scm/init", post(scm::initialize))
        .route("/{site}/scm/branches", get(scm::branches))
        .route("/{site}/scm/status", get(scm::status))
        .route("/{site}/scm/log", get(scm::log))
        .route("/{site}/scm/details/{id}", get(scm::details))
        .route("/{site}/scm/working", get(scm::working))
        .route("/{site}/scm/add", post(scm::add))
        .route("/{site}/scm/remove", post(scm::remove))
        .route("/{site}/scm/commit", post(scm::commit))
        .route("/{site}/scm/push", post(scm::push))
        .route("/{site}/scm/update", post(scm::update))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct InfoRefsQuery {
    service: Option<String>,
}

/// `GET /{site}/info/refs?service=git-receive-pack`
#[instrument(skip(state, query))]
async fn handle_info_refs(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    Query(query): Query<InfoRefsQuery>,
) -> Result<Response, ApiError> {
    state.check_site(&site)?;

    let service = query.service.unwrap_or_default();
    if service != RECEIVE_PACK_SERVICE {
        return Ok((
            StatusCode::FORBIDDEN,
            format!("Unsupported service: {service}"),
        )
            .into_response());
    }

    let gateway = state.gateway.clone();
    let buffered = tokio::task::spawn_blocking(move || {
        let mut response = BufferedResponse::new();
        gateway.advertise(&mut response).map(|_| response)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let head = buffered
        .head
        .unwrap_or_else(|| ResponseHead::new(StatusCode::INTERNAL_SERVER_ERROR));
    Ok(response_from(head, Body::from(buffered.body)))
}

/// `POST /{site}/git-receive-pack`
///
/// The gateway runs on the blocking pool with the request body bridged to
/// `Read` and its output streamed back as soon as the head is sent.
#[instrument(skip(state, headers, body))]
async fn handle_receive_pack(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    state.check_site(&site)?;

    let (mut sink, head_rx, mut body_rx) = ChannelResponse::new(BODY_CHANNEL_CAPACITY);
    let stream = body.into_data_stream().map_err(io::Error::other);
    let mut reader = SyncIoBridge::new_with_handle(StreamReader::new(Box::pin(stream)), Handle::current());

    let gateway = state.gateway.clone();
    let task = tokio::task::spawn_blocking(move || {
        let result = gateway.receive(&headers, &mut reader, &mut sink);
        match &result {
            Ok(outcome) => info!(?outcome, "push handled"),
            Err(e) => sink.fail(&e.to_string()),
        }
        result
    });

    match head_rx.await {
        Ok(head) => {
            debug!(status = %head.status, "streaming receive-pack response");
            let stream = futures::stream::poll_fn(move |cx| body_rx.poll_recv(cx));
            Ok(response_from(head, Body::from_stream(stream)))
        }
        // The gateway finished without sending a head
        Err(_) => match task.await {
            Ok(Err(e)) => Err(ApiError::Gateway(e)),
            Ok(Ok(outcome)) => Err(ApiError::Internal(format!(
                "push ended without a response: {outcome:?}"
            ))),
            Err(e) => Err(ApiError::Internal(e.to_string())),
        },
    }
}

/// `GET /{site}/deployments`
#[instrument(skip(state))]
async fn handle_deployments(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<Response, ApiError> {
    state.check_site(&site)?;

    let deployments = state.deployments.clone();
    let records = tokio::task::spawn_blocking(move || deployments.list())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(records).into_response())
}

fn response_from(head: ResponseHead, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = head.status;
    *response.headers_mut() = head.headers;
    response
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Handler errors mapped onto HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The path names a site this server does not host.
    UnknownSite(String),
    /// The deployment lock is held.
    Busy,
    Repository(RepositoryError),
    Gateway(GatewayError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut head = ResponseHead::new(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match self {
            ApiError::UnknownSite(site) => {
                head.status = StatusCode::NOT_FOUND;
                format!("Unknown site: {site}")
            }
            ApiError::Busy => {
                head.status = StatusCode::CONFLICT;
                "Another deployment operation is in progress".to_string()
            }
            ApiError::Repository(RepositoryError::NotFound(what)) => {
                head.status = StatusCode::NOT_FOUND;
                format!("Not found: {what}")
            }
            ApiError::Repository(err) => {
                error!(error = %err, "repository operation failed");
                err.to_string()
            }
            ApiError::Gateway(err) => {
                error!(error = %err, "push failed");
                err.to_string()
            }
            ApiError::Internal(message) => {
                error!(error = %message, "internal server error");
                message
            }
        };
        response_from(head, Body::from(message))
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        ApiError::Repository(err)
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl From<LockError> for ApiError {
    fn from(err: LockError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DeploymentError> for ApiError {
    fn from(err: DeploymentError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
