use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{JobError, Result};
use crate::logs::store::LogStore;
use crate::logs::watcher::{self, FileEvent};

/// Capacity of the chunk channel. One chunk in flight: publication blocks
/// until the consumer takes the previous chunk, so back-pressure reaches
/// the file reads and no bytes are ever dropped.
const CHUNK_BUFFER: usize = 1;

/// How long to park on the watcher before re-checking whether the writer
/// already finished. Covers close events that fired before the watch was
/// registered and events the backend lost.
const RECHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Produces a log file's contents as a lazy chunk sequence: full replay
/// from byte 0, then live follow until the writer is done or the consumer
/// cancels.
#[derive(Debug, Clone)]
pub struct LogTailer {
    store: LogStore,
    chunk_size: usize,
}

/// Why a drain pass stopped.
enum Drain {
    /// Reached the current end of the file.
    Eof,
    /// Cancelled or the consumer went away; unwind without another pass.
    Stopped,
}

impl LogTailer {
    pub fn new(store: LogStore, chunk_size: usize) -> Self {
        Self { store, chunk_size }
    }

    /// Stream the entire current content of the log for `id`, then every
    /// subsequent chunk as the file grows.
    ///
    /// `writer_done` must report whether the log writer has terminated for
    /// good; it gates the clean end of the sequence. A close event finishes
    /// the stream once the probe confirms it, and the periodic recheck
    /// covers writers that closed before the watch existed or whose close
    /// event the backend lost. Chunks are raw bytes with no alignment
    /// guarantees.
    ///
    /// Fails with `NotFound` if the log file does not exist. Cancelling
    /// `token` ends the sequence, closes the file handle and releases the
    /// watch on every exit path.
    pub async fn tail(
        &self,
        token: CancellationToken,
        id: Uuid,
        writer_done: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Result<mpsc::Receiver<Vec<u8>>> {
        let path = self.store.path(&id);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(JobError::NotFound(id))
            }
            Err(err) => return Err(JobError::Io(err)),
        };

        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let chunk_size = self.chunk_size;
        tokio::spawn(async move {
            if let Err(err) = follow(file, &path, chunk_size, tx, token, writer_done).await {
                tracing::warn!(job_id = %id, error = %err, "Log stream ended with error");
            }
        });

        Ok(rx)
    }
}

/// Replay-then-follow loop. Returning closes the chunk channel and the
/// file handle; the drop guard tears down the watch.
async fn follow(
    mut file: File,
    path: &Path,
    chunk_size: usize,
    tx: mpsc::Sender<Vec<u8>>,
    token: CancellationToken,
    writer_done: impl Fn() -> bool,
) -> io::Result<()> {
    let watch_token = token.child_token();
    let _watch_guard = watch_token.clone().drop_guard();

    let mut events: Option<mpsc::Receiver<FileEvent>> = None;
    let mut finishing = false;

    loop {
        match drain(&mut file, chunk_size, &tx, &token).await? {
            Drain::Stopped => return Ok(()),
            Drain::Eof => {}
        }
        if finishing {
            // This pass ran after the writer was known to be done, so the
            // subscriber has now seen every byte.
            return Ok(());
        }

        match events.as_mut() {
            None => {
                if writer_done() {
                    finishing = true;
                    continue;
                }
                events = Some(watcher::watch(path, watch_token.clone())?);
                // Loop without parking: bytes may have landed between the
                // EOF above and the watch registration.
            }
            Some(rx) => {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    event = rx.recv() => match event {
                        Some(FileEvent::Modified) => {}
                        // A subprocess of the job can close its copy of the
                        // log fd while the job lives on; the close only ends
                        // the stream once the writer is confirmed done. The
                        // recheck tick below closes the remaining race.
                        Some(FileEvent::Closed) => {
                            if writer_done() {
                                finishing = true;
                            }
                        }
                        // Watch gone mid-stream: finish with what is on disk.
                        None => finishing = true,
                    },
                    _ = time::sleep(RECHECK_INTERVAL) => {
                        if writer_done() {
                            finishing = true;
                        }
                    }
                }
            }
        }
    }
}

/// Read and publish chunks until the current EOF. Each read that returns
/// `n > 0` bytes is published as one chunk; publication races the
/// cancellation token so a stalled consumer cannot wedge shutdown.
async fn drain(
    file: &mut File,
    chunk_size: usize,
    tx: &mpsc::Sender<Vec<u8>>,
    token: &CancellationToken,
) -> io::Result<Drain> {
    loop {
        let mut chunk = vec![0u8; chunk_size];
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            return Ok(Drain::Eof);
        }
        chunk.truncate(n);

        tokio::select! {
            sent = tx.send(chunk) => {
                if sent.is_err() {
                    return Ok(Drain::Stopped);
                }
            }
            _ = token.cancelled() => return Ok(Drain::Stopped),
        }
    }
}
