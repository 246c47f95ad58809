//! git::interface
//!
//! Local repository operations using git2.
//!
//! `GitRepository` is the server side of the scm API: every
//! [`Repository`](crate::repository::Repository) operation the remote client
//! exposes is implemented here against the site's repository directory.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: No repository at the site path
//! - [`GitError::RevisionNotFound`]: Requested branch or revision does not exist
//! - [`GitError::Remote`]: Push target missing or rejected the push
//!
//! # Example
//!
//! ```ignore
//! use pushgate::git::GitRepository;
//!
//! let repo = GitRepository::new("/srv/site/repository");
//! repo.init()?;
//! if let Some(change) = repo.commit_all("deployer", "Update content")? {
//!     println!("committed {}", change.id);
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use git2::{BranchType, DiffOptions, ErrorCode, IndexAddOption, StatusOptions};
use thiserror::Error;

use crate::core::types::{
    Branch, ChangeSet, ChangeSetDetail, ChangeType, FileInfo, FileStatus, LineDiff,
};
use crate::repository::{Repository, RepositoryError};

/// Email used for commits when the repository has no `user.email`.
const FALLBACK_EMAIL: &str = "pushgate@localhost";

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository at the path.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Branch or revision not found.
    #[error("revision not found: {id}")]
    RevisionNotFound {
        /// The id that was looked up
        id: String,
    },

    /// Remote missing or push rejected.
    #[error("remote error: {message}")]
    Remote {
        /// Description of the failure
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<GitError> for RepositoryError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::RevisionNotFound { id } => RepositoryError::NotFound(id),
            other => RepositoryError::Backend(other.to_string()),
        }
    }
}

/// A git repository on local disk.
///
/// The underlying `git2::Repository` is opened per call, so the handle is
/// cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    /// Handle for the repository at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The repository's working directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<git2::Repository, GitError> {
        git2::Repository::open(&self.path).map_err(|_| GitError::NotARepo {
            path: self.path.clone(),
        })
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Create a non-bare repository that accepts pushes to its checked-out
    /// branch. Idempotent.
    pub fn init(&self) -> Result<(), GitError> {
        let repo = match git2::Repository::open(&self.path) {
            Ok(repo) => repo,
            Err(_) => {
                tracing::info!(path = %self.path.display(), "initializing repository");
                git2::Repository::init(&self.path)?
            }
        };
        repo.config()?
            .set_str("receive.denyCurrentBranch", "ignore")?;
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Id of the commit HEAD points to, `None` before the first commit.
    pub fn head_id(&self) -> Result<Option<String>, GitError> {
        let repo = self.open()?;
        let id = head_commit(&repo)?.map(|c| c.id().to_string());
        Ok(id)
    }

    /// Local branches with the commit each points to.
    pub fn list_branches(&self) -> Result<Vec<Branch>, GitError> {
        let repo = self.open()?;
        let mut branches = Vec::new();
        for entry in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = entry?;
            let Some(name) = branch.name()? else {
                continue;
            };
            let Some(target) = branch.get().target() else {
                continue;
            };
            branches.push(Branch {
                name: name.to_string(),
                id: target.to_string(),
            });
        }
        Ok(branches)
    }

    /// Changed and untracked paths in the working tree.
    pub fn file_statuses(&self) -> Result<Vec<FileStatus>, GitError> {
        let repo = self.open()?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);

        let statuses = repo.statuses(Some(&mut opts))?;
        let mut result = Vec::new();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            let status = status_change_type(entry.status());
            if status != ChangeType::None {
                result.push(FileStatus {
                    path: path.to_string(),
                    status,
                });
            }
        }
        Ok(result)
    }

    /// History from HEAD, newest first, skipping `index` and returning at
    /// most `limit` entries.
    pub fn log(&self, index: usize, limit: usize) -> Result<Vec<ChangeSet>, GitError> {
        let repo = self.open()?;
        let Some(head) = head_commit(&repo)? else {
            return Ok(vec![]);
        };

        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
        revwalk.push(head.id())?;

        let mut changes = Vec::new();
        for oid in revwalk.skip(index).take(limit) {
            let commit = repo.find_commit(oid?)?;
            changes.push(change_set(&commit));
        }
        Ok(changes)
    }

    /// Details of one revision, diffed against its first parent.
    pub fn revision_details(&self, id: &str) -> Result<ChangeSetDetail, GitError> {
        let repo = self.open()?;
        let commit = find_commit(&repo, id)?;

        let tree = commit.tree()?;
        let parent_tree = match commit.parents().next() {
            Some(parent) => Some(parent.tree()?),
            None => None,
        };

        let mut opts = DiffOptions::new();
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        detail_from_diff(&diff, Some(change_set(&commit)))
    }

    /// Uncommitted changes against HEAD, including untracked files.
    pub fn working_detail(&self) -> Result<Option<ChangeSetDetail>, GitError> {
        let repo = self.open()?;
        let head_tree = match head_commit(&repo)? {
            Some(commit) => Some(commit.tree()?),
            None => None,
        };

        let mut opts = DiffOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);
        let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

        if diff.deltas().len() == 0 {
            return Ok(None);
        }
        detail_from_diff(&diff, None).map(Some)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Stage a path relative to the working directory.
    pub fn stage(&self, path: &str) -> Result<(), GitError> {
        let repo = self.open()?;
        let mut index = repo.index()?;
        index.add_path(Path::new(path))?;
        index.write()?;
        Ok(())
    }

    /// Unstage a path and restore its committed content.
    pub fn restore(&self, path: &str) -> Result<(), GitError> {
        let repo = self.open()?;
        match head_commit(&repo)? {
            Some(head) => {
                repo.reset_default(Some(head.as_object()), [path])?;
                let mut checkout = git2::build::CheckoutBuilder::new();
                checkout.force().path(path);
                repo.checkout_head(Some(&mut checkout))?;
            }
            None => {
                let mut index = repo.index()?;
                index.remove_path(Path::new(path))?;
                index.write()?;
            }
        }
        Ok(())
    }

    /// Stage everything and commit. `None` if the tree did not change.
    pub fn commit_all(&self, author_name: &str, message: &str) -> Result<Option<ChangeSet>, GitError> {
        let repo = self.open()?;
        let mut index = repo.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = head_commit(&repo)?;
        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree_id,
            None => index.is_empty(),
        };
        if unchanged {
            tracing::debug!("nothing to commit");
            return Ok(None);
        }

        let email = repo
            .config()
            .and_then(|mut c| c.snapshot())
            .and_then(|c| c.get_string("user.email"))
            .unwrap_or_else(|_| FALLBACK_EMAIL.to_string());
        let signature = git2::Signature::now(author_name, &email)?;
        let tree = repo.find_tree(tree_id)?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        let commit = repo.find_commit(oid)?;
        tracing::info!(id = %oid, "committed changes");
        Ok(Some(change_set(&commit)))
    }

    /// Push the checked-out branch to `origin`.
    pub fn push_origin(&self) -> Result<(), GitError> {
        let repo = self.open()?;
        let head = repo.head().map_err(|_| GitError::Remote {
            message: "nothing to push: no commits".into(),
        })?;
        let Some(refname) = head.name().filter(|n| n.starts_with("refs/heads/")) else {
            return Err(GitError::Remote {
                message: "HEAD is detached".into(),
            });
        };

        let mut remote = repo.find_remote("origin").map_err(|_| GitError::Remote {
            message: "no remote named 'origin'".into(),
        })?;
        let refspec = format!("{0}:{0}", refname);
        remote.push(&[refspec.as_str()], None).map_err(|e| GitError::Remote {
            message: e.message().to_string(),
        })?;
        Ok(())
    }

    /// Check out a branch (attached) or revision (detached), discarding
    /// local modifications.
    pub fn checkout(&self, id: &str) -> Result<(), GitError> {
        let repo = self.open()?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();

        if let Ok(branch) = repo.find_branch(id, BranchType::Local) {
            let refname = branch
                .get()
                .name()
                .ok_or_else(|| GitError::RevisionNotFound { id: id.to_string() })?
                .to_string();
            repo.set_head(&refname)?;
            repo.checkout_head(Some(&mut checkout))?;
            return Ok(());
        }

        let commit = find_commit(&repo, id)?;
        repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
        repo.set_head_detached(commit.id())?;
        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&GitRepository) -> Result<T, GitError> + Send + 'static,
        T: Send + 'static,
    {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || f(&repo))
            .await
            .map_err(|e| RepositoryError::Backend(e.to_string()))?
            .map_err(RepositoryError::from)
    }
}

#[async_trait]
impl Repository for GitRepository {
    async fn current_id(&self) -> Result<Option<String>, RepositoryError> {
        self.blocking(|r| r.head_id()).await
    }

    async fn initialize(&self) -> Result<(), RepositoryError> {
        self.blocking(|r| r.init()).await
    }

    async fn branches(&self) -> Result<Vec<Branch>, RepositoryError> {
        self.blocking(|r| r.list_branches()).await
    }

    async fn status(&self) -> Result<Vec<FileStatus>, RepositoryError> {
        self.blocking(|r| r.file_statuses()).await
    }

    async fn changes(&self) -> Result<Vec<ChangeSet>, RepositoryError> {
        self.blocking(|r| r.log(0, usize::MAX)).await
    }

    async fn changes_page(
        &self,
        index: usize,
        limit: usize,
    ) -> Result<Vec<ChangeSet>, RepositoryError> {
        self.blocking(move |r| r.log(index, limit)).await
    }

    async fn details(&self, id: &str) -> Result<ChangeSetDetail, RepositoryError> {
        let id = id.to_string();
        self.blocking(move |r| r.revision_details(&id)).await
    }

    async fn working_changes(&self) -> Result<Option<ChangeSetDetail>, RepositoryError> {
        self.blocking(|r| r.working_detail()).await
    }

    async fn add_file(&self, path: &str) -> Result<(), RepositoryError> {
        let path = path.to_string();
        self.blocking(move |r| r.stage(&path)).await
    }

    async fn revert_file(&self, path: &str) -> Result<(), RepositoryError> {
        let path = path.to_string();
        self.blocking(move |r| r.restore(&path)).await
    }

    async fn commit(
        &self,
        author_name: &str,
        message: &str,
    ) -> Result<Option<ChangeSet>, RepositoryError> {
        let author_name = author_name.to_string();
        let message = message.to_string();
        self.blocking(move |r| r.commit_all(&author_name, &message))
            .await
    }

    async fn push(&self) -> Result<(), RepositoryError> {
        self.blocking(|r| r.push_origin()).await
    }

    async fn update(&self, id: &str) -> Result<(), RepositoryError> {
        let id = id.to_string();
        self.blocking(move |r| r.checkout(&id)).await
    }
}

fn head_commit(repo: &git2::Repository) -> Result<Option<git2::Commit<'_>>, GitError> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_commit()?)),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn find_commit<'r>(repo: &'r git2::Repository, id: &str) -> Result<git2::Commit<'r>, GitError> {
    repo.revparse_single(id)
        .and_then(|obj| obj.peel_to_commit())
        .map_err(|_| GitError::RevisionNotFound { id: id.to_string() })
}

fn change_set(commit: &git2::Commit<'_>) -> ChangeSet {
    let author = commit.author();
    let timestamp: DateTime<Utc> =
        DateTime::from_timestamp(author.when().seconds(), 0).unwrap_or_default();

    ChangeSet {
        id: commit.id().to_string(),
        author_name: author.name().unwrap_or("").to_string(),
        author_email: author.email().unwrap_or("").to_string(),
        message: commit.message().unwrap_or("").trim_end().to_string(),
        timestamp,
    }
}

fn status_change_type(status: git2::Status) -> ChangeType {
    if status.contains(git2::Status::WT_NEW) {
        ChangeType::Untracked
    } else if status.intersects(git2::Status::INDEX_NEW) {
        ChangeType::Added
    } else if status.intersects(git2::Status::INDEX_DELETED | git2::Status::WT_DELETED) {
        ChangeType::Deleted
    } else if status.intersects(git2::Status::INDEX_RENAMED | git2::Status::WT_RENAMED) {
        ChangeType::Renamed
    } else if status.intersects(
        git2::Status::INDEX_MODIFIED
            | git2::Status::WT_MODIFIED
            | git2::Status::INDEX_TYPECHANGE
            | git2::Status::WT_TYPECHANGE,
    ) {
        ChangeType::Modified
    } else {
        ChangeType::None
    }
}

fn delta_change_type(delta: git2::Delta) -> ChangeType {
    match delta {
        git2::Delta::Added => ChangeType::Added,
        git2::Delta::Deleted => ChangeType::Deleted,
        git2::Delta::Modified | git2::Delta::Typechange => ChangeType::Modified,
        git2::Delta::Renamed | git2::Delta::Copied => ChangeType::Renamed,
        git2::Delta::Untracked => ChangeType::Untracked,
        _ => ChangeType::None,
    }
}

fn delta_path(delta: &git2::DiffDelta<'_>) -> String {
    delta
        .new_file()
        .path()
        .or_else(|| delta.old_file().path())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn detail_from_diff(
    diff: &git2::Diff<'_>,
    change_set: Option<ChangeSet>,
) -> Result<ChangeSetDetail, GitError> {
    let mut files: BTreeMap<String, FileInfo> = BTreeMap::new();
    for delta in diff.deltas() {
        files.insert(
            delta_path(&delta),
            FileInfo {
                status: delta_change_type(delta.status()),
                binary: delta.flags().is_binary(),
                diff: Vec::new(),
            },
        );
    }

    diff.print(git2::DiffFormat::Patch, |delta, _hunk, line| {
        let Some(info) = files.get_mut(&delta_path(&delta)) else {
            return true;
        };
        let kind = match line.origin() {
            '+' => ChangeType::Added,
            '-' => ChangeType::Deleted,
            ' ' => ChangeType::None,
            'B' => {
                info.binary = true;
                return true;
            }
            _ => return true,
        };
        info.diff.push(LineDiff {
            kind,
            left_line: line.old_lineno(),
            right_line: line.new_lineno(),
            text: String::from_utf8_lossy(line.content())
                .trim_end_matches(['\r', '\n'])
                .to_string(),
        });
        true
    })?;

    let stats = diff.stats()?;
    Ok(ChangeSetDetail {
        change_set,
        files,
        files_changed: stats.files_changed(),
        insertions: stats.insertions(),
        deletions: stats.deletions(),
    })
}
