//! deploy::store
//!
//! File-backed deployment records, one JSON file per deployment under the
//! site's `deployments/` directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{DeploymentError, DeploymentManager, DeploymentRecord};

/// Deployment records stored as `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FileDeploymentStore {
    dir: PathBuf,
}

impl FileDeploymentStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Persist a record, replacing any existing one with the same id.
    pub fn write(&self, record: &DeploymentRecord) -> Result<(), DeploymentError> {
        fs::create_dir_all(&self.dir)?;

        let content = serde_json::to_string_pretty(record)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.record_path(&record.id))?;

        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Read a single record.
    pub fn read(&self, id: &str) -> Result<DeploymentRecord, DeploymentError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(DeploymentError::NotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl DeploymentManager for FileDeploymentStore {
    fn create_temporary(
        &self,
        status_text: &str,
        deployer: Option<&str>,
    ) -> Result<DeploymentRecord, DeploymentError> {
        let record = DeploymentRecord::temporary(status_text, deployer);
        self.write(&record)?;
        Ok(record)
    }

    fn remove(&self, id: &str) -> Result<(), DeploymentError> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DeploymentError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<DeploymentRecord>, DeploymentError> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            // A record removed between read_dir and read is skipped
            match self.read(id) {
                Ok(record) => records.push(record),
                Err(DeploymentError::NotFound(_)) => continue,
                Err(e) => {
                    tracing::warn!(id, error = %e, "skipping unreadable deployment record");
                }
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::{DeploymentStatus, TemporaryDeployment, RECEIVING_CHANGES};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn store() -> (TempDir, FileDeploymentStore) {
        let temp = TempDir::new().unwrap();
        let store = FileDeploymentStore::new(temp.path().join("deployments"));
        (temp, store)
    }

    #[test]
    fn list_empty_without_directory() {
        let (_temp, store) = store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn create_then_remove() {
        let (_temp, store) = store();
        let record = store.create_temporary(RECEIVING_CHANGES, Some("bob")).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed, vec![record.clone()]);

        store.remove(&record.id).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let (_temp, store) = store();
        assert!(matches!(store.remove("temp-nope"), Err(DeploymentError::NotFound(_))));
    }

    #[test]
    fn list_is_newest_first() {
        let (_temp, store) = store();
        let now = Utc::now();
        for (id, age) in [("old", 10), ("new", 0), ("mid", 5)] {
            store
                .write(&DeploymentRecord {
                    id: id.to_string(),
                    status: DeploymentStatus::Pending,
                    status_text: String::new(),
                    deployer: None,
                    created_at: now - Duration::minutes(age),
                    is_temporary: false,
                })
                .unwrap();
        }

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn list_skips_foreign_files() {
        let (_temp, store) = store();
        store.create_temporary("x", None).unwrap();
        fs::write(store.dir().join("README"), "not a record").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn guard_removes_file_on_drop() {
        let (_temp, store) = store();
        {
            let temp = TemporaryDeployment::create(&store, RECEIVING_CHANGES, None).unwrap();
            assert!(store.record_path(temp.id()).exists());
        }
        assert!(store.list().unwrap().is_empty());
    }
}
