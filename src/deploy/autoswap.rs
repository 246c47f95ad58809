//! deploy::autoswap
//!
//! Detection of an in-progress slot swap.
//!
//! A swap is in progress while the marker file exists and was touched within
//! the last [`DEFAULT_MARKER_TTL`]. A stale marker left behind by a crashed
//! swap stops blocking pushes once it expires. Sites without an auto-swap
//! slot never report a swap.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// How long a marker blocks pushes after it was last touched.
pub const DEFAULT_MARKER_TTL: Duration = Duration::from_secs(120);

/// Answers whether a slot swap is currently running.
pub trait AutoSwapGuard: Send + Sync {
    fn is_auto_swap_ongoing(&self) -> bool;
}

/// File-marker implementation of [`AutoSwapGuard`].
#[derive(Debug, Clone)]
pub struct AutoSwapMarker {
    path: PathBuf,
    slot: Option<String>,
    ttl: Duration,
}

impl AutoSwapMarker {
    /// Marker at `path` for the configured auto-swap `slot`.
    pub fn new(path: impl Into<PathBuf>, slot: Option<String>) -> Self {
        Self {
            path: path.into(),
            slot,
            ttl: DEFAULT_MARKER_TTL,
        }
    }

    /// Override the marker lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Slot that auto-swap promotes, if enabled.
    pub fn slot(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    /// Create or refresh the marker.
    pub fn mark(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.set_modified(SystemTime::now())?;
        Ok(())
    }

    /// Remove the marker. A missing marker is not an error.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl AutoSwapGuard for AutoSwapMarker {
    fn is_auto_swap_ongoing(&self) -> bool {
        if self.slot.is_none() {
            return false;
        }
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        // A marker from the future (clock skew) counts as fresh
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.ttl,
            Err(_) => true,
        }
    }
}
