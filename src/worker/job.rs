use uuid::Uuid;

/// Identifier assigned to a job when it is started.
pub type JobId = Uuid;

/// A start request: the program to run and its arguments.
///
/// `name` is an executable path or a name resolvable on PATH. The child
/// inherits the server environment; stdin is closed.
#[derive(Debug, Clone, Default)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

/// Point-in-time snapshot of a job's process state.
///
/// `exited` reports a normal exit. A process terminated by a signal keeps
/// `exited == false` and reports `exit_code == -1`, which is all the OS
/// exposes for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub pid: i32,
    pub exit_code: i32,
    pub exited: bool,
}

impl Status {
    /// Initial status for a freshly spawned process.
    pub fn running(pid: i32) -> Self {
        Self {
            pid,
            exit_code: 0,
            exited: false,
        }
    }

    /// Final status derived from what the OS reported at termination.
    pub fn from_exit(pid: i32, exit: std::process::ExitStatus) -> Self {
        Self {
            pid,
            exit_code: exit.code().unwrap_or(-1),
            exited: exit.code().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_status() {
        let status = Status::running(42);
        assert_eq!(status.pid, 42);
        assert_eq!(status.exit_code, 0);
        assert!(!status.exited);
    }

    #[cfg(unix)]
    #[test]
    fn test_from_exit_signal_termination() {
        use std::os::unix::process::ExitStatusExt;

        // Terminated by SIGTERM: no exit code available.
        let exit = std::process::ExitStatus::from_raw(15);
        let status = Status::from_exit(7, exit);
        assert_eq!(status.exit_code, -1);
        assert!(!status.exited);
    }

    #[cfg(unix)]
    #[test]
    fn test_from_exit_normal_exit() {
        use std::os::unix::process::ExitStatusExt;

        // Normal exit with code 3 (wait status is code << 8).
        let exit = std::process::ExitStatus::from_raw(3 << 8);
        let status = Status::from_exit(7, exit);
        assert_eq!(status.exit_code, 3);
        assert!(status.exited);
    }
}
