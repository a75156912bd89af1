//! JSON snapshot-backed activity repository.
//!
//! Records live in an [`InMemoryActivityRepository`]; after every successful
//! mutation the full record set is written to a temp file in the same
//! directory and renamed over the snapshot, so a crash leaves either the old
//! or the new snapshot on disk. A failed write rolls the in-memory record
//! back.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::NamedTempFile;

use mailstep_core::activity::{ActivityRepository, InMemoryActivityRepository};
use mailstep_core::activity::repository::ApplyFn;
use mailstep_types::activity::{ActivityInstance, ActivityInstanceId};
use mailstep_types::error::ActivityError;

pub struct FileActivityRepository {
    path: PathBuf,
    records: InMemoryActivityRepository,
    // Serializes update + snapshot write
    write_lock: Mutex<()>,
}

impl FileActivityRepository {
    /// Open the snapshot at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ActivityError> {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let instances: Vec<ActivityInstance> = serde_json::from_str(&content)
                    .map_err(|e| storage_error(&path, "parse", e))?;
                tracing::info!(path = %path.display(), count = instances.len(), "loaded activity snapshot");
                InMemoryActivityRepository::with_records(instances)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no activity snapshot yet, starting empty");
                InMemoryActivityRepository::new()
            }
            Err(err) => return Err(storage_error(&path, "read", err)),
        };

        Ok(Self {
            path,
            records,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_snapshot(&self) -> Result<(), ActivityError> {
        let mut instances = self.records.list()?;
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        let snapshot: Vec<&ActivityInstance> = instances.iter().map(Arc::as_ref).collect();
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| storage_error(&self.path, "serialize", e))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| storage_error(&self.path, "create directory for", e))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| storage_error(&self.path, "write", e))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| storage_error(&self.path, "write", e))?;
        tmp.persist(&self.path)
            .map_err(|e| storage_error(&self.path, "replace", e.error))?;
        Ok(())
    }
}

impl ActivityRepository for FileActivityRepository {
    fn get(&self, id: &ActivityInstanceId) -> Result<Option<Arc<ActivityInstance>>, ActivityError> {
        self.records.get(id)
    }

    fn update(
        &self,
        id: &ActivityInstanceId,
        apply: ApplyFn<'_>,
    ) -> Result<Arc<ActivityInstance>, ActivityError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.records.get(id)?;
        let updated = self.records.update(id, apply)?;

        if let Err(err) = self.write_snapshot() {
            self.records.restore(id, previous);
            return Err(err);
        }
        Ok(updated)
    }

    fn list(&self) -> Result<Vec<Arc<ActivityInstance>>, ActivityError> {
        self.records.list()
    }
}

fn storage_error(path: &Path, action: &str, err: impl std::fmt::Display) -> ActivityError {
    tracing::error!(path = %path.display(), error = %err, "failed to {action} activity snapshot");
    ActivityError::Storage(format!("failed to {action} {}: {err}", path.display()))
}
