//! Job engine: process lifecycle and status publication.
//!
//! - [`JobEngine`]: Start/Stop/Query/Stream facade over child processes
//! - [`JobTable`]: concurrency-safe registry with snapshot status reads
//! - One detached supervisor task per job reaps the child and publishes
//!   its final status through the table
//!
//! # Lifecycle
//!
//! 1. Start creates the log file and spawns the child with stdout and
//!    stderr redirected into it
//! 2. The job is registered, then the supervisor is launched
//! 3. The supervisor waits on the child and replaces the status exactly
//!    once
//! 4. Stream replays the log from byte 0 and follows it live

pub mod engine;
pub mod job;
pub mod table;

pub use engine::JobEngine;
pub use job::{Command, JobId, Status};
pub use table::{JobEntry, JobTable};
