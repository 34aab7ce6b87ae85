use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job already exited: {0}")]
    AlreadyExited(Uuid),

    #[error("Log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to signal process: {0}")]
    Signal(#[source] nix::Error),
}

pub type Result<T> = std::result::Result<T, JobError>;
