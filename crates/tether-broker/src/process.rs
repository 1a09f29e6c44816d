//! Child process execution for `execute` requests.

use std::fs;
use std::io;
use std::process::{Command, ExitStatus, Output, Stdio};
use std::sync::Arc;

use camino::Utf8Path;
use tracing::debug;

use crate::protocol::{Failure, IoCode};

/// Tracing target for process execution.
const PROCESS_TARGET: &str = "tether_broker::process";

/// How a child process ended. Exactly one variant applies per invocation.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// Exit code zero; carries captured stdout.
    Success(String),
    /// Non-zero exit code with captured stderr.
    ExitedNonZero {
        /// Exit code.
        code: i32,
        /// Captured standard error, decoded lossily.
        stderr: String,
    },
    /// Killed by a signal, so no exit code exists.
    TerminatedBySignal {
        /// Signal number, where the platform reports one.
        signal: Option<i32>,
    },
    /// The executable does not exist.
    ExecutableNotFound,
    /// The process could not be started for any other reason.
    SpawnFailed(Arc<io::Error>),
}

impl ProcessOutcome {
    /// Classifies the result of waiting for a child's output.
    #[must_use]
    pub fn classify(result: io::Result<Output>) -> Self {
        match result {
            Ok(output) => Self::from_output(output),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Self::ExecutableNotFound,
            Err(error) => Self::SpawnFailed(Arc::new(error)),
        }
    }

    fn from_output(output: Output) -> Self {
        match output.status.code() {
            Some(0) => Self::Success(String::from_utf8_lossy(&output.stdout).into_owned()),
            Some(code) => Self::ExitedNonZero {
                code,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            None => Self::TerminatedBySignal {
                signal: termination_signal(output.status),
            },
        }
    }

    /// Splits the outcome into what the program sees and the fatal case.
    ///
    /// # Errors
    ///
    /// Returns the spawn error for [`ProcessOutcome::SpawnFailed`], which the
    /// program cannot be told about.
    pub fn into_reply(self) -> Result<Result<String, Failure>, Arc<io::Error>> {
        match self {
            Self::Success(stdout) => Ok(Ok(stdout)),
            Self::ExitedNonZero { code, stderr } => Ok(Err(Failure::Exited { code, stderr })),
            Self::TerminatedBySignal { signal } => Ok(Err(Failure::Terminated { signal })),
            Self::ExecutableNotFound => Ok(Err(Failure::ExecutableNotFound)),
            Self::SpawnFailed(error) => Err(error),
        }
    }
}

#[cfg(unix)]
fn termination_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Runs `command` in `working_directory`, capturing its output.
///
/// Stdin is closed. The working directory is checked first so a missing
/// directory is never reported as a missing executable.
///
/// # Errors
///
/// Returns an I/O failure when `working_directory` is missing or is not a
/// directory.
pub fn execute(
    command: &str,
    arguments: &[String],
    working_directory: &Utf8Path,
) -> Result<ProcessOutcome, Failure> {
    let metadata = fs::metadata(working_directory)?;
    if !metadata.is_dir() {
        return Err(Failure::io_with(
            IoCode::NotADirectory,
            format!("{working_directory} is not a directory"),
        ));
    }

    debug!(
        target: PROCESS_TARGET,
        command,
        ?arguments,
        cwd = %working_directory,
        "executing command"
    );
    let output = Command::new(command)
        .args(arguments)
        .current_dir(working_directory)
        .stdin(Stdio::null())
        .output();
    let outcome = ProcessOutcome::classify(output);
    debug!(target: PROCESS_TARGET, command, ?outcome, "command finished");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn cwd() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        (dir, path)
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[rstest]
    fn missing_executable_is_distinguished(cwd: (TempDir, Utf8PathBuf)) {
        let outcome = execute("tether-no-such-command", &[], &cwd.1).expect("cwd exists");
        assert!(matches!(outcome, ProcessOutcome::ExecutableNotFound));
    }

    #[rstest]
    fn missing_working_directory_is_an_io_failure(cwd: (TempDir, Utf8PathBuf)) {
        let failure = execute("tether-no-such-command", &[], &cwd.1.join("absent"))
            .expect_err("no cwd");
        assert!(matches!(failure, Failure::Io { code: IoCode::NotFound, .. }));
    }

    #[rstest]
    fn file_as_working_directory_is_rejected(cwd: (TempDir, Utf8PathBuf)) {
        let file = cwd.1.join("file");
        fs::write(&file, "").expect("write");
        let failure = execute("true", &[], &file).expect_err("not a dir");
        assert!(matches!(
            failure,
            Failure::Io {
                code: IoCode::NotADirectory,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[rstest]
    fn zero_exit_yields_stdout(cwd: (TempDir, Utf8PathBuf)) {
        let outcome = execute("/bin/sh", &args(&["-c", "printf ok"]), &cwd.1).expect("run");
        let reply = outcome.into_reply().expect("not fatal");
        assert_eq!(reply, Ok(String::from("ok")));
    }

    #[cfg(unix)]
    #[rstest]
    fn runs_in_the_working_directory(cwd: (TempDir, Utf8PathBuf)) {
        fs::write(cwd.1.join("marker"), "").expect("marker");
        let outcome = execute("/bin/sh", &args(&["-c", "ls"]), &cwd.1).expect("run");
        assert!(matches!(outcome, ProcessOutcome::Success(ref out) if out.trim() == "marker"));
    }

    #[cfg(unix)]
    #[rstest]
    fn non_zero_exit_surfaces_stderr(cwd: (TempDir, Utf8PathBuf)) {
        let outcome = execute(
            "/bin/sh",
            &args(&["-c", "echo out; echo broken >&2; exit 3"]),
            &cwd.1,
        )
        .expect("run");
        let reply = outcome.into_reply().expect("not fatal");
        assert_eq!(
            reply,
            Err(Failure::Exited {
                code: 3,
                stderr: String::from("broken\n"),
            })
        );
    }

    #[cfg(unix)]
    #[rstest]
    fn signal_termination_has_no_code(cwd: (TempDir, Utf8PathBuf)) {
        let outcome = execute("/bin/sh", &args(&["-c", "kill -9 $$"]), &cwd.1).expect("run");
        assert!(matches!(
            outcome,
            ProcessOutcome::TerminatedBySignal { signal: Some(9) }
        ));
    }

    #[test]
    fn other_spawn_errors_are_fatal() {
        let outcome = ProcessOutcome::classify(Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        let error = outcome.into_reply().expect_err("fatal");
        assert_eq!(error.kind(), io::ErrorKind::PermissionDenied);
    }
}
