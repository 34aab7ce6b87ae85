use std::fs::File;
use std::io;
use std::path::PathBuf;

use uuid::Uuid;

/// Resolves and creates per-job log files under the configured folder.
///
/// The store hands out handles and paths; it never keeps a file open
/// beyond the call.
#[derive(Debug, Clone)]
pub struct LogStore {
    folder: PathBuf,
}

impl LogStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// Log file path for `id`: `<log_folder>/<id>.log`.
    pub fn path(&self, id: &Uuid) -> PathBuf {
        self.folder.join(format!("{}.log", id))
    }

    /// Create (or truncate) the log file for `id`.
    ///
    /// The handle is handed to the child process as its stdout/stderr.
    pub fn create(&self, id: &Uuid) -> io::Result<File> {
        File::create(self.path(id))
    }

    /// Delete the log file for `id`. Fails if it does not exist.
    pub fn remove(&self, id: &Uuid) -> io::Result<()> {
        std::fs::remove_file(self.path(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_path_layout() {
        let store = LogStore::new("/var/log/jobd");
        let id = Uuid::new_v4();
        assert_eq!(
            store.path(&id),
            PathBuf::from(format!("/var/log/jobd/{}.log", id))
        );
    }

    #[test]
    fn test_create_and_remove() {
        let dir = TempDir::new().expect("create temp dir");
        let store = LogStore::new(dir.path());
        let id = Uuid::new_v4();

        store.create(&id).expect("create log file");
        assert!(store.path(&id).exists());

        store.remove(&id).expect("remove log file");
        assert!(!store.path(&id).exists());

        // Removing twice reports the missing file.
        assert!(store.remove(&id).is_err());
    }

    #[test]
    fn test_create_in_missing_folder() {
        let store = LogStore::new("/nonexistent/jobd-logs");
        assert!(store.create(&Uuid::new_v4()).is_err());
    }
}
