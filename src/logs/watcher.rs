use std::io;
use std::path::Path;

use notify::event::{AccessKind, AccessMode, EventKind};
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Filesystem event on a watched log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    /// The file content grew or changed.
    Modified,
    /// A writer that held the file open closed it.
    Closed,
}

/// Capacity of the event channel. Modified events are collapsible (the
/// tailer re-drains to EOF on each one), so a small buffer is enough; the
/// backend callback blocks rather than dropping a Closed event.
const EVENT_BUFFER: usize = 16;

fn classify(kind: &EventKind) -> Option<FileEvent> {
    match kind {
        EventKind::Modify(_) => Some(FileEvent::Modified),
        // IN_CLOSE_WRITE on the inotify backend.
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(FileEvent::Closed),
        _ => None,
    }
}

/// Watch `path` for modify and close events until `token` is cancelled.
///
/// Registration failures are returned synchronously. Backend errors after
/// registration are logged; consumers only observe them as the channel
/// closing. Cancellation drops the OS registration.
pub fn watch(path: &Path, token: CancellationToken) -> io::Result<mpsc::Receiver<FileEvent>> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    let event_tx = tx.clone();
    let mut watcher =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if let Some(file_event) = classify(&event.kind) {
                    // The callback runs on the backend thread; blocking here
                    // is the back-pressure, and send only fails once the
                    // consumer is gone.
                    let _ = event_tx.blocking_send(file_event);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "File watch backend error");
            }
        })
        .map_err(into_io)?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(into_io)?;

    // Park the watcher until cancellation; dropping it releases the OS
    // registration, and dropping the senders closes the event channel.
    tokio::spawn(async move {
        token.cancelled().await;
        drop(watcher);
        drop(tx);
    });

    Ok(rx)
}

fn into_io(err: notify::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}
