//! gateway
//!
//! Turns an inbound smart-HTTP push into a serialized deployment operation.
//!
//! # Flow
//!
//! 1. A non-Git repository at the target is rejected with `400`; the lock is
//!    never attempted.
//! 2. The deployment lock is tried once with no wait. If it is held the push
//!    is rejected with `409` and an empty body.
//! 3. Inside the lock, an ongoing auto-swap rejects the push with `409` and a
//!    message; the payload is never read.
//! 4. The basic-auth user, if any, is recorded as the deployer.
//! 5. A temporary deployment is listed for the duration of the transfer.
//! 6. The payload is streamed through `git receive-pack`.
//!
//! The temporary deployment is removed before the lock is released, on every
//! exit path including panics.
//!
//! No auto-swap is triggered after a successful push: the response head has
//! already been sent by then, so there is no way to signal it to the client.

mod auth;
mod response;

pub use auth::basic_auth_user;
pub use response::{
    suppress_caching, BufferedResponse, PushResponse, ResponseHead, RECEIVE_PACK_ADVERTISEMENT,
    RECEIVE_PACK_RESULT,
};

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::core::ops::{try_lock_operation, LockError, OperationLock};
use crate::core::types::RepositoryType;
use crate::deploy::{
    AutoSwapGuard, DeploymentError, DeploymentManager, TemporaryDeployment, RECEIVING_CHANGES,
};
use crate::git::{GitServer, ReceiveError, RepositoryFactory};

/// Body of the auto-swap conflict response.
pub const AUTO_SWAP_ONGOING_MESSAGE: &str =
    "There is an auto swap deployment currently ongoing, please try again when it's done.";

/// Why a push was refused before any data was transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The target holds a repository of another kind.
    NonGitRepository(RepositoryType),
    /// Another deployment-affecting operation holds the lock.
    LockHeld,
    /// A slot swap is in progress.
    AutoSwapOngoing,
}

impl Rejection {
    /// HTTP status sent for this rejection.
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::NonGitRepository(_) => StatusCode::BAD_REQUEST,
            Rejection::LockHeld | Rejection::AutoSwapOngoing => StatusCode::CONFLICT,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NonGitRepository(kind) => write!(f, "target is a {} repository", kind),
            Rejection::LockHeld => write!(f, "deployment lock is held"),
            Rejection::AutoSwapOngoing => write!(f, "auto swap is ongoing"),
        }
    }
}

/// Result of a push attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The pack was received.
    Completed {
        /// Id of the temporary deployment shown during the transfer
        deployment_id: String,
    },
    /// The push was refused; the rejection status has been sent.
    Rejected(Rejection),
}

/// Failures while handling a push.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The git transfer failed.
    #[error("receive-pack failed: {0}")]
    Stream(#[from] ReceiveError),

    /// The lock could not be used (not contention).
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The temporary deployment could not be created.
    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    /// The response could not be written.
    #[error("failed to send response: {0}")]
    Response(#[source] io::Error),
}

/// The receive-pack endpoint's state machine.
#[derive(Clone)]
pub struct ReceivePackGateway {
    repositories: Arc<dyn RepositoryFactory>,
    lock: Arc<dyn OperationLock>,
    auto_swap: Arc<dyn AutoSwapGuard>,
    deployments: Arc<dyn DeploymentManager>,
    git: Arc<dyn GitServer>,
}

impl std::fmt::Debug for ReceivePackGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceivePackGateway")
            .field("lock_held", &self.lock.is_held())
            .finish_non_exhaustive()
    }
}

impl ReceivePackGateway {
    pub fn new(
        repositories: Arc<dyn RepositoryFactory>,
        lock: Arc<dyn OperationLock>,
        auto_swap: Arc<dyn AutoSwapGuard>,
        deployments: Arc<dyn DeploymentManager>,
        git: Arc<dyn GitServer>,
    ) -> Self {
        Self {
            repositories,
            lock,
            auto_swap,
            deployments,
            git,
        }
    }

    /// The shared deployment lock.
    pub fn lock(&self) -> &Arc<dyn OperationLock> {
        &self.lock
    }

    /// Handle one push.
    ///
    /// Blocks the calling thread for the whole transfer. Rejections are
    /// returned as [`ReceiveOutcome::Rejected`] after their status has been
    /// sent; errors are returned after the temporary deployment and the lock
    /// have been released.
    #[tracing::instrument(name = "receive_pack", skip_all)]
    pub fn receive(
        &self,
        headers: &HeaderMap,
        body: &mut (dyn Read + Send),
        response: &mut dyn PushResponse,
    ) -> Result<ReceiveOutcome, GatewayError> {
        if let Some(rejection) = self.non_git_rejection() {
            return reject(response, rejection);
        }

        tracing::debug!("attempting deployment lock");
        let attempt = try_lock_operation(self.lock.as_ref(), Duration::ZERO, || {
            self.receive_locked(headers, body, response)
        })?;

        match attempt {
            Some(result) => {
                if let Err(e) = &result {
                    tracing::error!(error = %e, "push failed");
                }
                result
            }
            None => {
                tracing::debug!("deployment lock busy");
                reject(response, Rejection::LockHeld)
            }
        }
    }

    /// Write the receive-pack ref advertisement.
    #[tracing::instrument(name = "advertise_refs", skip_all)]
    pub fn advertise(&self, response: &mut dyn PushResponse) -> Result<(), GatewayError> {
        if let Some(rejection) = self.non_git_rejection() {
            return reject(response, rejection).map(drop);
        }

        let mut advertisement = Vec::new();
        self.git.advertise_receive_pack(&mut advertisement)?;

        response
            .send_head(ResponseHead::new(StatusCode::OK).with_content_type(RECEIVE_PACK_ADVERTISEMENT))
            .map_err(GatewayError::Response)?;
        let body = response.body();
        body.write_all(&advertisement)
            .and_then(|_| body.flush())
            .map_err(GatewayError::Response)
    }

    fn non_git_rejection(&self) -> Option<Rejection> {
        match self.repositories.repository_type() {
            Some(RepositoryType::Git) | None => None,
            Some(other) => {
                tracing::debug!(kind = %other, "target is not a git repository");
                Some(Rejection::NonGitRepository(other))
            }
        }
    }

    /// The critical section. Everything acquired here is released before the
    /// caller's lock guard drops.
    fn receive_locked(
        &self,
        headers: &HeaderMap,
        body: &mut (dyn Read + Send),
        response: &mut dyn PushResponse,
    ) -> Result<ReceiveOutcome, GatewayError> {
        tracing::debug!(held = self.lock.is_held(), "deployment lock acquired");
        let head = ResponseHead::new(StatusCode::OK).with_content_type(RECEIVE_PACK_RESULT);

        if self.auto_swap.is_auto_swap_ongoing() {
            tracing::debug!("auto swap ongoing");
            let head = ResponseHead {
                status: Rejection::AutoSwapOngoing.status(),
                ..head
            };
            response.send_head(head).map_err(GatewayError::Response)?;
            response
                .body()
                .write_all(AUTO_SWAP_ONGOING_MESSAGE.as_bytes())
                .map_err(GatewayError::Response)?;
            return Ok(ReceiveOutcome::Rejected(Rejection::AutoSwapOngoing));
        }

        let deployer = basic_auth_user(headers);
        tracing::debug!(deployer = deployer.as_deref().unwrap_or("-"), "receiving push");

        let tracker =
            TemporaryDeployment::create(self.deployments.as_ref(), RECEIVING_CHANGES, deployer.as_deref())?;
        let deployment_id = tracker.id().to_string();

        let transfer = response
            .send_head(head)
            .map_err(GatewayError::Response)
            .and_then(|_| {
                self.git
                    .receive(deployer.as_deref(), body, response.body())
                    .map_err(GatewayError::from)
            });

        if let Err(e) = tracker.finish() {
            tracing::warn!(id = %deployment_id, error = %e, "failed to remove temporary deployment");
        }

        transfer.map(|_| ReceiveOutcome::Completed { deployment_id })
    }
}

fn reject(
    response: &mut dyn PushResponse,
    rejection: Rejection,
) -> Result<ReceiveOutcome, GatewayError> {
    response
        .send_head(ResponseHead::new(rejection.status()))
        .map_err(GatewayError::Response)?;
    Ok(ReceiveOutcome::Rejected(rejection))
}
