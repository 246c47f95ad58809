//! http::scm
//!
//! Repository API served for [`RemoteRepository`](crate::repository::RemoteRepository).
//!
//! Mutating routes (`init`, `add`, `remove`, `commit`, `push`, `update`) take
//! the deployment lock with no wait and answer `409` while it is held, so they
//! never interleave with a push.
//!
//! The lock and the repository call live in a spawned task. A handler that is
//! cancelled (client gone, request timeout) detaches from that task, and the
//! lock stays held until the repository work has actually finished.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::instrument;

use super::{ApiError, AppState};
use crate::core::ops::LockGuard;
use crate::core::types::{Branch, ChangeSet, ChangeSetDetail, FileStatus};
use crate::repository::RepositoryError;

#[derive(Debug, Deserialize)]
pub(super) struct LogQuery {
    index: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PathBody {
    path: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommitBody {
    name: String,
    message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateBody {
    id: String,
}

/// Run `operation` under the deployment lock, or fail with `Busy`.
async fn locked<T, F, Fut>(state: &Arc<AppState>, operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(Arc<AppState>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, RepositoryError>> + Send + 'static,
{
    tokio::spawn(run_locked(Arc::clone(state), operation))
        .await
        .map_err(|e| ApiError::Internal(format!("repository task failed: {e}")))?
}

async fn run_locked<T, F, Fut>(state: Arc<AppState>, operation: F) -> Result<T, ApiError>
where
    F: FnOnce(Arc<AppState>) -> Fut,
    Fut: Future<Output = Result<T, RepositoryError>>,
{
    let Some(_guard) = LockGuard::try_acquire(state.lock(), Duration::ZERO)? else {
        return Err(ApiError::Busy);
    };
    Ok(operation(Arc::clone(&state)).await?)
}

pub(super) async fn current_id(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<String, ApiError> {
    state.check_site(&site)?;
    Ok(state.repository.current_id().await?.unwrap_or_default())
}

#[instrument(skip(state))]
pub(super) async fn initialize(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.check_site(&site)?;
    locked(&state, move |state| async move { state.repository.initialize().await }).await?;
    Ok(StatusCode::OK)
}

pub(super) async fn branches(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<Json<Vec<Branch>>, ApiError> {
    state.check_site(&site)?;
    Ok(Json(state.repository.branches().await?))
}

pub(super) async fn status(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<Json<Vec<FileStatus>>, ApiError> {
    state.check_site(&site)?;
    Ok(Json(state.repository.status().await?))
}

pub(super) async fn log(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ChangeSet>>, ApiError> {
    state.check_site(&site)?;
    let changes = match (query.index, query.limit) {
        (None, None) => state.repository.changes().await?,
        (index, limit) => {
            state
                .repository
                .changes_page(index.unwrap_or(0), limit.unwrap_or(usize::MAX))
                .await?
        }
    };
    Ok(Json(changes))
}

pub(super) async fn details(
    State(state): State<Arc<AppState>>,
    Path((site, id)): Path<(String, String)>,
) -> Result<Json<ChangeSetDetail>, ApiError> {
    state.check_site(&site)?;
    Ok(Json(state.repository.details(&id).await?))
}

pub(super) async fn working(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<Json<Option<ChangeSetDetail>>, ApiError> {
    state.check_site(&site)?;
    Ok(Json(state.repository.working_changes().await?))
}

#[instrument(skip(state, body))]
pub(super) async fn add(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    Json(body): Json<PathBody>,
) -> Result<StatusCode, ApiError> {
    state.check_site(&site)?;
    locked(&state, move |state| async move { state.repository.add_file(&body.path).await }).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state, body))]
pub(super) async fn remove(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    Json(body): Json<PathBody>,
) -> Result<StatusCode, ApiError> {
    state.check_site(&site)?;
    locked(&state, move |state| async move { state.repository.revert_file(&body.path).await }).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state, body))]
pub(super) async fn commit(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    Json(body): Json<CommitBody>,
) -> Result<Json<Option<ChangeSet>>, ApiError> {
    state.check_site(&site)?;
    let change = locked(&state, move |state| async move {
        state.repository.commit(&body.name, &body.message).await
    })
    .await?;
    Ok(Json(change))
}

#[instrument(skip(state))]
pub(super) async fn push(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.check_site(&site)?;
    locked(&state, move |state| async move { state.repository.push().await }).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state, body))]
pub(super) async fn update(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Result<StatusCode, ApiError> {
    state.check_site(&site)?;
    locked(&state, move |state| async move { state.repository.update(&body.id).await }).await?;
    Ok(StatusCode::OK)
}
