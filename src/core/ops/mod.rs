//! core::ops
//!
//! Serialization of deployment-affecting operations.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive deployment lock
//!
//! # Architecture
//!
//! Every deployment-affecting operation:
//! 1. Attempts the site's deployment lock without waiting
//! 2. Reports a conflict immediately if another operation holds it
//! 3. Runs its critical section while the guard is alive
//! 4. Releases through the guard's drop on every exit path

pub mod lock;

pub use lock::{try_lock_operation, DeploymentLock, LockError, LockGuard, OperationLock};
