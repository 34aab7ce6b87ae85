use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::worker::job::{JobId, Status};
use crate::error::{JobError, Result};

/// One registered job: the spawned pid plus its mutable status cell.
///
/// The child handle itself is owned by the job's supervisor task; Stop
/// signals by pid, so nothing here needs to reach the process object.
pub struct JobEntry {
    pub id: JobId,
    pub pid: i32,
    status: RwLock<Status>,
    finished: AtomicBool,
}

impl JobEntry {
    pub fn new(id: JobId, pid: i32) -> Self {
        Self {
            id,
            pid,
            status: RwLock::new(Status::running(pid)),
            finished: AtomicBool::new(false),
        }
    }

    /// Coherent copy of the current status, never a torn view.
    pub fn status(&self) -> Status {
        *self.status.read()
    }
}

/// Concurrency-safe registry of jobs.
///
/// Entries are inserted once per Start and retained after exit so Query
/// and Stream keep working post-mortem.
#[derive(Default)]
pub struct JobTable {
    jobs: DashMap<JobId, Arc<JobEntry>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: JobEntry) {
        self.jobs.insert(entry.id, Arc::new(entry));
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn get(&self, id: &JobId) -> Result<Arc<JobEntry>> {
        self.jobs
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(JobError::NotFound(*id))
    }

    /// Snapshot of the current status of `id`.
    pub fn status(&self, id: &JobId) -> Result<Status> {
        self.get(id).map(|entry| entry.status())
    }

    /// Replace the status of `id` and mark the job finished.
    ///
    /// Called exactly once per job, by its supervisor after reaping.
    pub fn update_status(&self, id: &JobId, status: Status) {
        if let Some(entry) = self.jobs.get(id) {
            *entry.status.write() = status;
            entry.finished.store(true, Ordering::Release);
        }
    }

    /// Whether the supervisor has published a final status.
    ///
    /// This is the terminal marker: unlike `Status::exited` it also covers
    /// processes killed by a signal, so log tailers key off it instead of
    /// the wire-visible bit. Unknown ids count as finished.
    pub fn is_finished(&self, id: &JobId) -> bool {
        self.jobs
            .get(id)
            .map(|entry| entry.finished.load(Ordering::Acquire))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_insert_and_snapshot() {
        let table = JobTable::new();
        let id = Uuid::new_v4();
        table.insert(JobEntry::new(id, 100));

        let status = table.status(&id).unwrap();
        assert_eq!(status.pid, 100);
        assert_eq!(status.exit_code, 0);
        assert!(!status.exited);
        assert!(!table.is_finished(&id));
    }

    #[test]
    fn test_update_status_marks_finished() {
        let table = JobTable::new();
        let id = Uuid::new_v4();
        table.insert(JobEntry::new(id, 100));

        table.update_status(
            &id,
            Status {
                pid: 100,
                exit_code: 2,
                exited: true,
            },
        );

        let status = table.status(&id).unwrap();
        assert_eq!(status.exit_code, 2);
        assert!(status.exited);
        assert!(table.is_finished(&id));
    }

    #[test]
    fn test_unknown_id() {
        let table = JobTable::new();
        let id = Uuid::new_v4();
        assert!(matches!(table.status(&id), Err(JobError::NotFound(_))));
        // A job the table never knew counts as finished.
        assert!(table.is_finished(&id));
    }
}
