//! git::factory
//!
//! Detect which kind of repository, if any, lives at a site's repository path.

use std::path::{Path, PathBuf};

use crate::core::types::RepositoryType;

/// Reports the repository type at a fixed location.
pub trait RepositoryFactory: Send + Sync {
    /// `None` if there is no repository yet.
    fn repository_type(&self) -> Option<RepositoryType>;
}

/// Repository detection for one site.
#[derive(Debug, Clone)]
pub struct SiteRepositoryFactory {
    path: PathBuf,
}

impl SiteRepositoryFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RepositoryFactory for SiteRepositoryFactory {
    fn repository_type(&self) -> Option<RepositoryType> {
        if self.path.join(".git").exists() || git2::Repository::open(&self.path).is_ok() {
            Some(RepositoryType::Git)
        } else if self.path.join(".hg").is_dir() {
            Some(RepositoryType::Mercurial)
        } else {
            None
        }
    }
}
