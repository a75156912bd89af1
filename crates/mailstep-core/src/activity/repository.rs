//! ActivityRepository trait and the DashMap-backed in-memory implementation.
//!
//! Records are immutable `Arc<ActivityInstance>` values that get replaced
//! whole under the shard lock, so a reader observes either the old or the
//! new record, never a partial write.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use mailstep_types::activity::{ActivityInstance, ActivityInstanceId};
use mailstep_types::error::ActivityError;

/// Read-modify-write callback applied atomically to one record.
///
/// Receives the current record (if any) and returns its replacement, or an
/// error to leave the record untouched.
pub type ApplyFn<'a> =
    &'a mut dyn FnMut(Option<&ActivityInstance>) -> Result<ActivityInstance, ActivityError>;

/// Storage backend for activity instance records.
///
/// Operations are synchronous and in-memory from the caller's point of view;
/// durable implementations persist after the in-memory swap.
pub trait ActivityRepository: Send + Sync {
    fn get(&self, id: &ActivityInstanceId) -> Result<Option<Arc<ActivityInstance>>, ActivityError>;

    /// Atomically replace the record for `id` with the result of `apply`.
    fn update(
        &self,
        id: &ActivityInstanceId,
        apply: ApplyFn<'_>,
    ) -> Result<Arc<ActivityInstance>, ActivityError>;

    fn list(&self) -> Result<Vec<Arc<ActivityInstance>>, ActivityError>;
}

/// Thread-safe in-memory repository.
#[derive(Default)]
pub struct InMemoryActivityRepository {
    records: DashMap<ActivityInstanceId, Arc<ActivityInstance>>,
}

impl InMemoryActivityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository with previously persisted records.
    pub fn with_records(records: impl IntoIterator<Item = ActivityInstance>) -> Self {
        let repo = Self::new();
        for record in records {
            repo.records.insert(record.id.clone(), Arc::new(record));
        }
        repo
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Put back a record captured before a failed write (`None` removes).
    pub fn restore(&self, id: &ActivityInstanceId, previous: Option<Arc<ActivityInstance>>) {
        match previous {
            Some(record) => {
                self.records.insert(id.clone(), record);
            }
            None => {
                self.records.remove(id);
            }
        }
    }
}

impl ActivityRepository for InMemoryActivityRepository {
    fn get(&self, id: &ActivityInstanceId) -> Result<Option<Arc<ActivityInstance>>, ActivityError> {
        Ok(self.records.get(id).map(|r| Arc::clone(r.value())))
    }

    fn update(
        &self,
        id: &ActivityInstanceId,
        apply: ApplyFn<'_>,
    ) -> Result<Arc<ActivityInstance>, ActivityError> {
        match self.records.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                let next = Arc::new(apply(Some(entry.get().as_ref()))?);
                entry.insert(Arc::clone(&next));
                Ok(next)
            }
            Entry::Vacant(entry) => {
                let next = Arc::new(apply(None)?);
                entry.insert(Arc::clone(&next));
                Ok(next)
            }
        }
    }

    fn list(&self) -> Result<Vec<Arc<ActivityInstance>>, ActivityError> {
        Ok(self.records.iter().map(|r| Arc::clone(r.value())).collect())
    }
}
