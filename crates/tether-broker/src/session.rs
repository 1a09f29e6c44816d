//! Session state and the request loop.
//!
//! A [`Session`] owns the transport to the hosted program and the
//! [`SessionContext`] every handler works against. [`Session::run`] drives
//! requests until the program exits, aborts, closes its channel, or the
//! broker hits a fatal error, and then always performs the same
//! finalisation: release the program, then sweep the temporary directories.

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, error, info};

use crate::confine::PathConfiner;
use crate::dispatch::{Dispatcher, Outcome};
use crate::error::BrokerError;
use crate::network::{HttpClient, UreqClient};
use crate::protocol::Failure;
use crate::registry::{SweepReport, TempRegistry};
use crate::request::Transfer;
use crate::transport::Transport;
use crate::version::IMPLEMENTED_VERSION;

/// Tracing target for session lifecycle events.
const SESSION_TARGET: &str = "tether_broker::session";

/// Exit status used when the program aborts.
const ABORT_STATUS: i32 = 1;

/// State shared by every handler for the lifetime of a session.
pub struct SessionContext<W> {
    confiner: PathConfiner,
    registry: TempRegistry,
    stdout: W,
    http: Arc<dyn HttpClient>,
}

impl<W: Write> SessionContext<W> {
    /// Creates a context resolving anchors against `working_directory`,
    /// naming temporary directories with `temp_prefix`, and writing program
    /// output to `stdout`.
    #[must_use]
    pub fn new(working_directory: &Utf8Path, temp_prefix: &str, stdout: W) -> Self {
        Self {
            confiner: PathConfiner::new(working_directory),
            registry: TempRegistry::new(temp_prefix),
            stdout,
            http: Arc::new(UreqClient::new()),
        }
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http = client;
        self
    }

    /// Path confiner for program-supplied paths.
    #[must_use]
    pub const fn confiner(&self) -> &PathConfiner {
        &self.confiner
    }

    /// Temporary directories created so far.
    #[must_use]
    pub const fn registry(&self) -> &TempRegistry {
        &self.registry
    }

    /// Mutable access to the registry, for directories the embedder creates
    /// before the session starts.
    pub fn registry_mut(&mut self) -> &mut TempRegistry {
        &mut self.registry
    }

    /// Destination of program output.
    #[must_use]
    pub const fn stdout(&self) -> &W {
        &self.stdout
    }

    pub(crate) fn http_client(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    pub(crate) fn write_stdout(&mut self, text: &str) -> Result<(), BrokerError> {
        self.stdout
            .write_all(text.as_bytes())
            .and_then(|()| self.stdout.flush())
            .map_err(|source| BrokerError::WriteStdout {
                source: Arc::new(source),
            })
    }

    pub(crate) fn resolve(&self, segments: &[String]) -> Result<Utf8PathBuf, Failure> {
        self.confiner.resolve(segments).map_err(|violation| {
            debug!(
                target: SESSION_TARGET,
                ?segments,
                %violation,
                "path confinement violation"
            );
            Failure::from(violation)
        })
    }

    pub(crate) fn resolve_pair(
        &self,
        transfer: &Transfer,
    ) -> Result<(Utf8PathBuf, Utf8PathBuf), Failure> {
        Ok((
            self.resolve(&transfer.source_path)?,
            self.resolve(&transfer.destination_path)?,
        ))
    }

    pub(crate) fn create_temporary_directory(&mut self) -> Result<Utf8PathBuf, Failure> {
        self.registry.create().map_err(Failure::from)
    }
}

/// Why a session ended.
#[derive(Debug, Clone)]
pub enum EndReason {
    /// The program sent `exit`.
    Exit(i32),
    /// The program sent `abort`.
    Aborted,
    /// The program closed its channel; carries its own exit status.
    Completed(i32),
    /// The broker could not continue.
    Fatal(BrokerError),
}

impl EndReason {
    /// Exit status for the broker process.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Exit(code) | Self::Completed(code) => *code,
            Self::Aborted => ABORT_STATUS,
            Self::Fatal(error) => error.exit_status(),
        }
    }

    /// The fatal error, if the session ended with one.
    #[must_use]
    pub const fn fatal(&self) -> Option<&BrokerError> {
        match self {
            Self::Fatal(error) => Some(error),
            _ => None,
        }
    }
}

/// Result of a finished session.
#[derive(Debug, Clone)]
pub struct SessionEnd {
    /// Why the session ended.
    pub reason: EndReason,
    /// What the temporary-directory sweep did.
    pub cleanup: SweepReport,
}

impl SessionEnd {
    /// Exit status for the broker process.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.reason.exit_code()
    }
}

/// One hosted program run from handshake to finalisation.
pub struct Session<T, W> {
    transport: T,
    context: SessionContext<W>,
    dispatcher: Dispatcher,
}

impl<T: Transport, W: Write> Session<T, W> {
    /// Creates a session over `transport`.
    #[must_use]
    pub fn new(transport: T, context: SessionContext<W>) -> Self {
        Self {
            transport,
            context,
            dispatcher: Dispatcher::new(IMPLEMENTED_VERSION),
        }
    }

    /// Replaces the dispatcher, for example to speak another version.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Runs the session to its end.
    ///
    /// Finalisation happens here and nowhere else: the program is released
    /// and then every registered temporary directory is removed, whatever
    /// the reason the session ended.
    #[must_use]
    pub fn run(mut self) -> (SessionEnd, SessionContext<W>) {
        info!(target: SESSION_TARGET, version = %IMPLEMENTED_VERSION, "session started");
        let reason = self.drive().unwrap_or_else(EndReason::Fatal);
        match &reason {
            EndReason::Fatal(fatal) => {
                error!(target: SESSION_TARGET, error = %fatal, "session failed");
            }
            other => {
                info!(
                    target: SESSION_TARGET,
                    reason = ?other,
                    exit_code = other.exit_code(),
                    "session ended"
                );
            }
        }

        self.transport.shutdown();
        let cleanup = self.context.registry.sweep();
        debug!(target: SESSION_TARGET, ?cleanup, "temporary directories swept");
        (SessionEnd { reason, cleanup }, self.context)
    }

    fn drive(&mut self) -> Result<EndReason, BrokerError> {
        while let Some(request) = self.transport.next_request()? {
            match self.dispatcher.handle(request, &mut self.context)? {
                Outcome::Respond(response) => self.transport.respond(&response)?,
                Outcome::Exit(code) => return Ok(EndReason::Exit(code)),
                Outcome::Abort => return Ok(EndReason::Aborted),
            }
        }
        Ok(EndReason::Completed(self.transport.completion_status()?))
    }
}
