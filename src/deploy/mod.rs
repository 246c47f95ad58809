//! deploy
//!
//! Deployment records and the guards that manage their lifetime.
//!
//! # Temporary Deployments
//!
//! While a push is being received, a placeholder record is listed alongside
//! real deployments so the UI can show that something is in progress. The
//! placeholder is owned by a [`TemporaryDeployment`] guard and is removed
//! exactly once when the guard is finished or dropped, on every exit path
//! including panics.
//!
//! # Example
//!
//! ```ignore
//! use pushgate::deploy::{FileDeploymentStore, TemporaryDeployment};
//!
//! let store = FileDeploymentStore::new(paths.deployments_dir());
//! let temp = TemporaryDeployment::create(&store, "Receiving changes", Some("alice"))?;
//! receive_push()?;
//! temp.finish()?;
//! ```

pub mod autoswap;
mod store;

pub use autoswap::{AutoSwapGuard, AutoSwapMarker};
pub use store::FileDeploymentStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Status text shown while a push is being received.
pub const RECEIVING_CHANGES: &str = "Receiving changes";

/// Prefix for temporary deployment ids.
const TEMPORARY_ID_PREFIX: &str = "temp-";

/// Errors from deployment record operations.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// I/O error reading or writing deployment records.
    #[error("deployment i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("deployment json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No record with the given id.
    #[error("deployment not found: {0}")]
    NotFound(String),
}

/// Lifecycle state of a deployment record.
///
/// Records written here are placeholders for a push that has not produced a
/// deployment yet, so they are always pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            DeploymentStatus::Pending => "pending",
        })
    }
}

/// A deployment as listed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: String,
    pub status: DeploymentStatus,
    /// Human-readable progress text
    pub status_text: String,
    /// User that triggered the deployment, if known
    #[serde(default)]
    pub deployer: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Placeholder for an in-progress push, never a real deployment
    #[serde(default)]
    pub is_temporary: bool,
}

impl DeploymentRecord {
    /// Build a new temporary record with a fresh id.
    pub fn temporary(status_text: &str, deployer: Option<&str>) -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{}{}", TEMPORARY_ID_PREFIX, &uuid[..12]),
            status: DeploymentStatus::Pending,
            status_text: status_text.to_string(),
            deployer: deployer.map(str::to_string),
            created_at: Utc::now(),
            is_temporary: true,
        }
    }
}

/// Stores and lists deployment records.
pub trait DeploymentManager: Send + Sync {
    /// Create and persist a temporary deployment record.
    fn create_temporary(
        &self,
        status_text: &str,
        deployer: Option<&str>,
    ) -> Result<DeploymentRecord, DeploymentError>;

    /// Remove a record. Removing an unknown id is `NotFound`.
    fn remove(&self, id: &str) -> Result<(), DeploymentError>;

    /// List all records, newest first.
    fn list(&self) -> Result<Vec<DeploymentRecord>, DeploymentError>;
}

/// RAII owner of a temporary deployment record.
///
/// The record is removed by [`finish`](Self::finish) or, failing that, by
/// `Drop`. Removal happens at most once.
pub struct TemporaryDeployment<'a> {
    manager: &'a dyn DeploymentManager,
    record: DeploymentRecord,
    removed: bool,
}

impl<'a> TemporaryDeployment<'a> {
    /// Create a temporary deployment through `manager`.
    pub fn create(
        manager: &'a dyn DeploymentManager,
        status_text: &str,
        deployer: Option<&str>,
    ) -> Result<Self, DeploymentError> {
        let record = manager.create_temporary(status_text, deployer)?;
        tracing::debug!(id = %record.id, "created temporary deployment");
        Ok(Self {
            manager,
            record,
            removed: false,
        })
    }

    /// The record's id.
    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// The record as created.
    pub fn record(&self) -> &DeploymentRecord {
        &self.record
    }

    /// Remove the record now and surface any error.
    pub fn finish(mut self) -> Result<(), DeploymentError> {
        self.removed = true;
        self.manager.remove(&self.record.id)
    }
}

impl Drop for TemporaryDeployment<'_> {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Err(e) = self.manager.remove(&self.record.id) {
            tracing::warn!(id = %self.record.id, error = %e, "failed to remove temporary deployment");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingManager {
        created: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
    }

    impl DeploymentManager for CountingManager {
        fn create_temporary(
            &self,
            status_text: &str,
            deployer: Option<&str>,
        ) -> Result<DeploymentRecord, DeploymentError> {
            let record = DeploymentRecord::temporary(status_text, deployer);
            self.created.lock().unwrap().push(record.id.clone());
            Ok(record)
        }

        fn remove(&self, id: &str) -> Result<(), DeploymentError> {
            self.removed.lock().unwrap().push(id.to_string());
            Ok(())
        }

        fn list(&self) -> Result<Vec<DeploymentRecord>, DeploymentError> {
            Ok(vec![])
        }
    }

    #[test]
    fn temporary_record_shape() {
        let record = DeploymentRecord::temporary(RECEIVING_CHANGES, Some("alice"));
        assert!(record.id.starts_with("temp-"));
        assert_eq!(record.id.len(), 17);
        assert!(record.is_temporary);
        assert_eq!(record.status, DeploymentStatus::Pending);
        assert_eq!(record.deployer.as_deref(), Some("alice"));
    }

    #[test]
    fn ids_are_unique() {
        let a = DeploymentRecord::temporary("x", None);
        let b = DeploymentRecord::temporary("x", None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn drop_removes_once() {
        let manager = CountingManager::default();
        let id = {
            let temp = TemporaryDeployment::create(&manager, RECEIVING_CHANGES, None).unwrap();
            temp.id().to_string()
        };
        assert_eq!(*manager.removed.lock().unwrap(), vec![id]);
    }

    #[test]
    fn finish_removes_once() {
        let manager = CountingManager::default();
        let temp = TemporaryDeployment::create(&manager, RECEIVING_CHANGES, None).unwrap();
        temp.finish().unwrap();
        assert_eq!(manager.removed.lock().unwrap().len(), 1);
    }

    #[test]
    fn panic_still_removes() {
        let manager = CountingManager::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _temp = TemporaryDeployment::create(&manager, RECEIVING_CHANGES, None).unwrap();
            panic!("bridge exploded");
        }));
        assert!(result.is_err());
        assert_eq!(manager.removed.lock().unwrap().len(), 1);
    }

    #[test]
    fn status_serializes_snake_case() {
        let value = serde_json::to_value(DeploymentStatus::Pending).unwrap();
        assert_eq!(value, "pending");
    }
}
