use std::process::Stdio;
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{JobError, Result};
use crate::logs::{LogStore, LogTailer};
use crate::worker::job::{Command, JobId, Status};
use crate::worker::table::{JobEntry, JobTable};

/// Facade over the job table, the log store and the tailer: spawns and
/// supervises child processes and fans their output out to subscribers.
pub struct JobEngine {
    table: Arc<JobTable>,
    store: LogStore,
    tailer: LogTailer,
}

impl JobEngine {
    pub fn new(config: &Config) -> Self {
        let store = LogStore::new(&config.log_folder);
        let tailer = LogTailer::new(store.clone(), config.log_chunk_size);
        Self {
            table: Arc::new(JobTable::new()),
            store,
            tailer,
        }
    }

    /// Spawn a process with both output streams redirected into its log
    /// file, register it and launch its supervisor.
    ///
    /// A failed spawn removes the log file again and leaves no table
    /// entry.
    pub async fn start(&self, command: Command) -> Result<JobId> {
        let id = Uuid::new_v4();

        let logfile = self.store.create(&id)?;
        let stderr = logfile.try_clone()?;

        let mut child = match process::Command::new(&command.name)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(logfile))
            .stderr(Stdio::from(stderr))
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                if let Err(remove_err) = self.store.remove(&id) {
                    tracing::warn!(job_id = %id, error = %remove_err, "Failed to remove log file after spawn failure");
                }
                return Err(JobError::Spawn(err));
            }
        };

        let pid = child.id().map(|pid| pid as i32).unwrap_or_default();
        self.table.insert(JobEntry::new(id, pid));
        tracing::info!(job_id = %id, pid, name = %command.name, "Job started");

        // Supervisor: owns the child, reaps it and publishes the final
        // status. Launched only after the entry exists so the update
        // always lands.
        let table = Arc::clone(&self.table);
        tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(exit) => Status::from_exit(pid, exit),
                Err(err) => {
                    tracing::warn!(job_id = %id, error = %err, "Waiting on child failed");
                    Status {
                        pid,
                        exit_code: -1,
                        exited: false,
                    }
                }
            };
            tracing::info!(
                job_id = %id,
                exit_code = status.exit_code,
                exited = status.exited,
                "Job finished"
            );
            table.update_status(&id, status);
        });

        Ok(id)
    }

    /// Deliver SIGTERM to a running job.
    ///
    /// Reports success once the signal is delivered, not once the child
    /// exits; the supervisor publishes the final status asynchronously.
    pub fn stop(&self, id: &JobId) -> Result<()> {
        let entry = self.table.get(id)?;
        if entry.status().exited {
            return Err(JobError::AlreadyExited(*id));
        }
        // A pid of zero would signal our own process group.
        if entry.pid <= 0 {
            return Err(JobError::Signal(Errno::ESRCH));
        }
        // The child may exit between the check above and the syscall; the
        // ESRCH from a reaped pid surfaces as a signal error.
        kill(Pid::from_raw(entry.pid), Signal::SIGTERM).map_err(JobError::Signal)?;
        tracing::info!(job_id = %id, pid = entry.pid, "Sent SIGTERM");
        Ok(())
    }

    /// Current status snapshot of a job.
    pub fn query(&self, id: &JobId) -> Result<Status> {
        self.table.status(id)
    }

    /// Replay the job's log from byte 0 and follow it live until the
    /// writer closes it or `token` fires.
    ///
    /// The existence check keeps callers from tailing arbitrary files by
    /// guessing identifiers.
    pub async fn stream(
        &self,
        token: CancellationToken,
        id: &JobId,
    ) -> Result<mpsc::Receiver<Vec<u8>>> {
        if !self.table.contains(id) {
            return Err(JobError::NotFound(*id));
        }
        let table = Arc::clone(&self.table);
        let job = *id;
        self.tailer
            .tail(token, job, move || table.is_finished(&job))
            .await
    }
}
