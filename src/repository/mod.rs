//! repository
//!
//! Source-control operations on a site's repository.
//!
//! # Design
//!
//! The `Repository` trait is async because the remote implementation is a
//! network client. The local git2 implementation
//! ([`GitRepository`](crate::git::GitRepository)) runs its blocking work on
//! the blocking thread pool. The `http` scm routes serve a local
//! implementation and [`RemoteRepository`] talks to those routes, so both
//! sides share one set of semantics.
//!
//! # Example
//!
//! ```ignore
//! use pushgate::repository::{RemoteRepository, Repository};
//!
//! let repo = RemoteRepository::new("http://localhost:8080/site/scm/")?;
//! for change in repo.changes_page(0, 10).await? {
//!     println!("{} {}", &change.id[..7], change.summary());
//! }
//! ```

mod remote;

pub use remote::RemoteRepository;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{Branch, ChangeSet, ChangeSetDetail, FileStatus};

/// Errors from repository operations.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The requested revision or path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The local repository backend failed.
    #[error("repository error: {0}")]
    Backend(String),
}

/// Operations on a site repository.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Id of the current revision, `None` for an empty repository.
    async fn current_id(&self) -> Result<Option<String>, RepositoryError>;

    /// Create the repository if it does not exist.
    async fn initialize(&self) -> Result<(), RepositoryError>;

    async fn branches(&self) -> Result<Vec<Branch>, RepositoryError>;

    /// Working tree status, one entry per changed path.
    async fn status(&self) -> Result<Vec<FileStatus>, RepositoryError>;

    /// Full history from the current revision, newest first.
    async fn changes(&self) -> Result<Vec<ChangeSet>, RepositoryError>;

    /// A window of history: skip `index` entries, return at most `limit`.
    async fn changes_page(
        &self,
        index: usize,
        limit: usize,
    ) -> Result<Vec<ChangeSet>, RepositoryError>;

    /// Revision details including per-file diffs.
    ///
    /// Returns `RepositoryError::NotFound` if `id` is unknown.
    async fn details(&self, id: &str) -> Result<ChangeSetDetail, RepositoryError>;

    /// Uncommitted changes, `None` when the working tree is clean.
    async fn working_changes(&self) -> Result<Option<ChangeSetDetail>, RepositoryError>;

    async fn add_file(&self, path: &str) -> Result<(), RepositoryError>;

    /// Discard changes to `path`, restoring the committed version.
    async fn revert_file(&self, path: &str) -> Result<(), RepositoryError>;

    /// Commit all pending changes. `None` if there was nothing to commit.
    async fn commit(
        &self,
        author_name: &str,
        message: &str,
    ) -> Result<Option<ChangeSet>, RepositoryError>;

    /// Push the current branch to `origin`.
    async fn push(&self) -> Result<(), RepositoryError>;

    /// Check out a branch or revision.
    async fn update(&self, id: &str) -> Result<(), RepositoryError>;
}
