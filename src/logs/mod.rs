//! Per-job log files: storage, change watching and live tailing.

pub mod store;
pub mod tailer;
pub mod watcher;

pub use store::LogStore;
pub use tailer::LogTailer;
pub use watcher::FileEvent;
