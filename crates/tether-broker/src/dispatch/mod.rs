//! Request routing.
//!
//! The [`Dispatcher`] is a two-phase state machine. Until the program has
//! negotiated a protocol version, only `checkVersion` is accepted; after
//! that every request is decoded, routed by name, and answered exactly once.
//! Handlers run once per request and are never retried.

use std::io::Write;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::BrokerError;
use crate::filesystem::{self, EntryFilter};
use crate::network;
use crate::process;
use crate::protocol::{Failure, Request, Response};
use crate::request::{ExecuteCommand, HostRequest};
use crate::session::SessionContext;
use crate::version::{self, IMPLEMENTED_VERSION, ProtocolVersion};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = "tether_broker::dispatch";

/// Negotiation state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No version has been negotiated yet.
    AwaitingVersion,
    /// The program's version was accepted.
    Ready,
}

/// What the session does after a request has been handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Send this response and wait for the next request.
    Respond(Response),
    /// End the session with this status; no response is sent.
    Exit(i32),
    /// End the session with failure after the abort text was written.
    Abort,
}

/// Routes requests to their handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    phase: Phase,
    implemented: ProtocolVersion,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(IMPLEMENTED_VERSION)
    }
}

impl Dispatcher {
    /// Creates a dispatcher speaking `implemented`.
    #[must_use]
    pub const fn new(implemented: ProtocolVersion) -> Self {
        Self {
            phase: Phase::AwaitingVersion,
            implemented,
        }
    }

    /// Current negotiation phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Handles one request.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] for protocol violations, version mismatches,
    /// unexpected spawn failures and stdout write failures. Every other
    /// problem is answered with a failure response.
    pub fn handle<W: Write>(
        &mut self,
        request: Request,
        context: &mut SessionContext<W>,
    ) -> Result<Outcome, BrokerError> {
        let decoded = HostRequest::parse(request)?;
        let name = decoded.name();
        debug!(target: DISPATCH_TARGET, request = %name, phase = ?self.phase, "handling request");

        if self.phase == Phase::AwaitingVersion && !matches!(decoded, HostRequest::CheckVersion(_))
        {
            return Err(BrokerError::NegotiationRequired {
                name: name.to_string(),
            });
        }

        let reply = match decoded {
            HostRequest::CheckVersion(required) => {
                version::negotiate(required, self.implemented)?;
                self.phase = Phase::Ready;
                info!(
                    target: DISPATCH_TARGET,
                    %required,
                    implemented = %self.implemented,
                    "protocol version negotiated"
                );
                Ok(Value::Null)
            }
            HostRequest::WriteStdout(text) => {
                context.write_stdout(&text)?;
                Ok(Value::Null)
            }
            HostRequest::Exit(code) => return Ok(Outcome::Exit(code)),
            HostRequest::Abort(text) => {
                context.write_stdout(&text)?;
                return Ok(Outcome::Abort);
            }
            HostRequest::Execute(command) => execute(context, command)?,
            HostRequest::ReadFile(path) => context
                .resolve(&path)
                .and_then(|resolved| filesystem::read_file(&resolved))
                .map(Value::String),
            HostRequest::WriteFile(write) => context
                .resolve(&write.path)
                .and_then(|resolved| filesystem::write_file(&resolved, &write.contents))
                .map(unit),
            HostRequest::ListFiles(path) => context
                .resolve(&path)
                .and_then(|resolved| filesystem::list(&resolved, EntryFilter::Files))
                .map(Value::from),
            HostRequest::ListSubdirectories(path) => context
                .resolve(&path)
                .and_then(|resolved| filesystem::list(&resolved, EntryFilter::Directories))
                .map(Value::from),
            HostRequest::CopyFile(transfer) => context
                .resolve_pair(&transfer)
                .and_then(|(source, destination)| filesystem::copy_file(&source, &destination))
                .map(unit),
            HostRequest::MoveFile(transfer) => context
                .resolve_pair(&transfer)
                .and_then(|(source, destination)| filesystem::move_file(&source, &destination))
                .map(unit),
            HostRequest::DeleteFile(path) => context
                .resolve(&path)
                .and_then(|resolved| filesystem::delete_file(&resolved))
                .map(unit),
            HostRequest::Stat(path) => context
                .resolve(&path)
                .and_then(|resolved| filesystem::stat(&resolved))
                .map(|kind| Value::from(kind.as_ref())),
            HostRequest::CreateDirectory(change) => context
                .resolve(&change.path)
                .and_then(|resolved| filesystem::create_directory(&resolved, change.recursive))
                .map(unit),
            HostRequest::RemoveDirectory(change) => context
                .resolve(&change.path)
                .and_then(|resolved| filesystem::remove_directory(&resolved, change.recursive))
                .map(unit),
            HostRequest::CreateTemporaryDirectory => context
                .create_temporary_directory()
                .map(|path| Value::String(path.into_string())),
            HostRequest::Http(fetch) => network::fetch(context.http_client(), fetch)
                .map(|reply| json!({"status": reply.status, "body": reply.body})),
        };
        Ok(Outcome::Respond(Response::from(reply)))
    }
}

/// Runs a command; only an unexpected spawn failure is fatal.
fn execute<W: Write>(
    context: &SessionContext<W>,
    command: ExecuteCommand,
) -> Result<Result<Value, Failure>, BrokerError> {
    let started = context
        .resolve(&command.working_directory)
        .and_then(|cwd| process::execute(&command.command, &command.arguments, &cwd));
    let outcome = match started {
        Ok(outcome) => outcome,
        Err(failure) => return Ok(Err(failure)),
    };
    let reply = outcome
        .into_reply()
        .map_err(|source| BrokerError::SpawnFailed {
            command: command.command,
            source,
        })?;
    Ok(reply.map(Value::String))
}

const fn unit((): ()) -> Value {
    Value::Null
}
