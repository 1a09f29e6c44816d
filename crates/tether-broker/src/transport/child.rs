//! The hosted program as a child process.

use std::io::{self, BufReader};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{JsonlTransport, TRANSPORT_TARGET, Transport, TransportError};
use crate::flags::Flags;
use crate::protocol::{Request, Response};

/// Exit status reported when the program was killed by a signal.
const SIGNALLED_STATUS: i32 = 1;

/// Program and arguments used to start the hosted program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    program: String,
    args: Vec<String>,
}

impl LaunchSpec {
    /// Launches `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Program to execute.
    #[must_use]
    pub const fn program(&self) -> &str {
        self.program.as_str()
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Runs the hosted program with requests on its stdout and responses on its
/// stdin. Its stderr is inherited.
///
/// The child is killed and reaped if the transport is dropped while it is
/// still running.
#[derive(Debug)]
pub struct ChildTransport {
    child: Child,
    channel: JsonlTransport<BufReader<ChildStdout>, ChildStdin>,
    reaped: bool,
}

impl ChildTransport {
    /// Starts the program and sends it the session flags.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Launch`] when the program cannot be started
    /// and [`TransportError::MissingPipe`] when its stdio was not captured.
    pub fn launch(spec: &LaunchSpec, flags: &Flags) -> Result<Self, TransportError> {
        debug!(
            target: TRANSPORT_TARGET,
            program = spec.program(),
            args = ?spec.args(),
            "launching program"
        );
        let mut child = Command::new(spec.program())
            .args(spec.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| TransportError::Launch {
                program: spec.program().to_owned(),
                source: Arc::new(source),
            })?;

        let pipes = child.stdin.take().zip(child.stdout.take());
        let Some((stdin, stdout)) = pipes else {
            drop(child.kill());
            drop(child.wait());
            return Err(TransportError::MissingPipe {
                stream: "stdio",
            });
        };

        let mut transport = Self {
            child,
            channel: JsonlTransport::new(BufReader::new(stdout), stdin),
            reaped: false,
        };
        match transport.channel.send_flags(flags) {
            Ok(()) => Ok(transport),
            Err(TransportError::Write { source }) if source.kind() == io::ErrorKind::BrokenPipe => {
                // The program exited without reading; its status is reported at
                // end of input.
                debug!(target: TRANSPORT_TARGET, "program closed stdin before flags were sent");
                Ok(transport)
            }
            Err(error) => Err(error),
        }
    }

    /// Process id of the child.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl Transport for ChildTransport {
    fn next_request(&mut self) -> Result<Option<Request>, TransportError> {
        self.channel.next_request()
    }

    fn respond(&mut self, response: &Response) -> Result<(), TransportError> {
        self.channel.respond(response)
    }

    fn completion_status(&mut self) -> Result<i32, TransportError> {
        self.channel.close_writer();
        let status = self.child.wait().map_err(|source| TransportError::Wait {
            source: Arc::new(source),
        })?;
        self.reaped = true;
        debug!(target: TRANSPORT_TARGET, ?status, "program exited");
        Ok(status.code().unwrap_or(SIGNALLED_STATUS))
    }

    fn shutdown(&mut self) {
        if self.reaped {
            return;
        }
        self.channel.close_writer();
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(target: TRANSPORT_TARGET, ?status, "program already exited");
            }
            Ok(None) => {
                debug!(target: TRANSPORT_TARGET, pid = self.child.id(), "killing program");
                if let Err(error) = self.child.kill() {
                    warn!(target: TRANSPORT_TARGET, %error, "failed to kill program");
                }
                drop(self.child.wait());
            }
            Err(error) => {
                warn!(target: TRANSPORT_TARGET, %error, "failed to poll program status");
            }
        }
        self.reaped = true;
    }
}

impl Drop for ChildTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}
