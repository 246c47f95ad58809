//! core::ops::lock
//!
//! Exclusive deployment lock.
//!
//! # Architecture
//!
//! The deployment lock ensures only one deployment-affecting operation runs
//! at a time for a site. The receive-pack gateway and the mutating
//! repository API share a single [`OperationLock`] handle, passed around as
//! `Arc<dyn OperationLock>` so tests can substitute a contention double.
//!
//! # Storage
//!
//! - `<site>/locks/deployments.lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - At most one critical section holds the lock at any instant
//! - The lock is not reentrant: a holder trying again fails like anyone else
//! - Acquisition never queues; with a zero wait it fails fast
//! - [`LockGuard`] releases on drop (RAII), including during panics
//!
//! # Example
//!
//! ```ignore
//! use pushgate::core::ops::lock::{DeploymentLock, LockGuard};
//! use std::time::Duration;
//!
//! let lock = DeploymentLock::new(paths.deployment_lock_path());
//! match LockGuard::try_acquire(&lock, Duration::ZERO)? {
//!     Some(_guard) => { /* critical section */ }
//!     None => { /* someone else is deploying */ }
//! }
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

/// Interval between attempts when a non-zero wait is requested.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another operation already holds the lock.
    #[error("deployment lock is held by another operation")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// A non-reentrant, non-queued mutual exclusion capability.
pub trait OperationLock: Send + Sync {
    /// Whether an operation holds the lock through this handle.
    ///
    /// Holders in other processes are not observed. Probing them would mean
    /// taking the OS lock, which makes a concurrent acquisition fail.
    fn is_held(&self) -> bool;

    /// Try to take the lock, polling for at most `wait`.
    ///
    /// Returns [`LockError::AlreadyLocked`] when the lock is still held at the
    /// deadline. A zero `wait` makes exactly one attempt.
    fn acquire(&self, wait: Duration) -> Result<(), LockError>;

    /// Release the lock. Releasing an unheld lock is a no-op.
    fn release(&self) -> Result<(), LockError>;
}

/// Ownership token for a held [`OperationLock`].
///
/// Dropping the guard releases the lock exactly once.
pub struct LockGuard<'a> {
    lock: &'a dyn OperationLock,
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

impl<'a> LockGuard<'a> {
    /// Try to acquire `lock`, returning `None` if it is held elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures other than contention (for example
    /// the lock file cannot be created).
    pub fn try_acquire(
        lock: &'a dyn OperationLock,
        wait: Duration,
    ) -> Result<Option<Self>, LockError> {
        match lock.acquire(wait) {
            Ok(()) => Ok(Some(Self { lock })),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            tracing::warn!(error = %e, "failed to release deployment lock");
        }
    }
}

/// Run `operation` while holding `lock`.
///
/// Returns `Ok(None)` without running `operation` if the lock could not be
/// taken within `wait`.
pub fn try_lock_operation<T>(
    lock: &dyn OperationLock,
    wait: Duration,
    operation: impl FnOnce() -> T,
) -> Result<Option<T>, LockError> {
    match LockGuard::try_acquire(lock, wait)? {
        Some(_guard) => Ok(Some(operation())),
        None => Ok(None),
    }
}

/// File-backed deployment lock.
///
/// Uses OS-level file locking via `fs2`, so the lock also excludes other
/// processes serving the same site.
#[derive(Debug)]
pub struct DeploymentLock {
    /// Path to the lock file.
    path: PathBuf,
    /// The open file handle while this process holds the lock.
    file: Mutex<Option<File>>,
}

impl DeploymentLock {
    /// Create a lock backed by the file at `path`. Nothing is touched on disk
    /// until the first acquisition.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, LockError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                LockError::CreateFailed(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| LockError::CreateFailed(format!("cannot open {}: {}", self.path.display(), e)))
    }

    /// Make exactly one acquisition attempt.
    fn try_once(&self) -> Result<(), LockError> {
        let mut held = self
            .file
            .lock()
            .map_err(|_| LockError::AcquireFailed("lock state poisoned".into()))?;
        if held.is_some() {
            return Err(LockError::AlreadyLocked);
        }

        let file = self.open()?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                *held = Some(file);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }
}

impl OperationLock for DeploymentLock {
    fn is_held(&self) -> bool {
        // Poisoned means a holder panicked mid-update
        self.file.lock().map(|held| held.is_some()).unwrap_or(true)
    }

    fn acquire(&self, wait: Duration) -> Result<(), LockError> {
        let deadline = Instant::now() + wait;
        loop {
            match self.try_once() {
                Err(LockError::AlreadyLocked) if Instant::now() < deadline => {
                    thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
                }
                other => return other,
            }
        }
    }

    fn release(&self) -> Result<(), LockError> {
        let mut held = self
            .file
            .lock()
            .map_err(|_| LockError::ReleaseFailed("lock state poisoned".into()))?;
        if let Some(file) = held.take() {
            FileExt::unlock(&file).map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for DeploymentLock {
    fn drop(&mut self) {
        // Best-effort release on drop - ignore errors since we're dropping
        if let Ok(held) = self.file.get_mut() {
            if let Some(file) = held.take() {
                let _ = FileExt::unlock(&file);
            }
        }
    }
}
