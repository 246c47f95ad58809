//! core::paths
//!
//! Centralized path routing for a site's storage locations.
//!
//! # Storage Layout
//!
//! Everything a site owns lives under its root directory:
//! - `repository/` - The deployed repository (target of receive-pack)
//! - `deployments/` - Deployment records, one JSON file each
//! - `locks/deployments.lock` - Exclusive deployment lock file
//! - `locks/autoswap.lock` - Marker present while an auto-swap runs
//!
//! No code outside this module should compute these paths.
//!
//! # Example
//!
//! ```
//! use pushgate::core::paths::SitePaths;
//! use std::path::PathBuf;
//!
//! let paths = SitePaths::new("/srv/site");
//! assert_eq!(paths.repository_dir(), PathBuf::from("/srv/site/repository"));
//! assert_eq!(
//!     paths.deployment_lock_path(),
//!     PathBuf::from("/srv/site/locks/deployments.lock")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Path routing for one site root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    root: PathBuf,
}

impl SitePaths {
    /// Create path routing for the given site root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The site root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the deployed repository.
    pub fn repository_dir(&self) -> PathBuf {
        self.root.join("repository")
    }

    /// Directory holding deployment records.
    pub fn deployments_dir(&self) -> PathBuf {
        self.root.join("deployments")
    }

    /// Directory holding lock and marker files.
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    /// Lock file serializing deployment-affecting operations.
    pub fn deployment_lock_path(&self) -> PathBuf {
        self.locks_dir().join("deployments.lock")
    }

    /// Marker file present while an auto-swap is in progress.
    pub fn auto_swap_marker_path(&self) -> PathBuf {
        self.locks_dir().join("autoswap.lock")
    }
}
