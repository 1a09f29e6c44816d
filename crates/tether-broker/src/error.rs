//! Fatal broker errors.
//!
//! A [`BrokerError`] ends the session. Anything the hosted program can act
//! on is reported as a [`Failure`](crate::protocol::Failure) instead. I/O and
//! JSON errors are wrapped in `Arc` to satisfy the `result_large_err` Clippy
//! lint.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::transport::TransportError;
use crate::version::VersionError;

/// Conditions that terminate the session with a failure status.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The program sent a request name the broker does not implement.
    #[error("unknown request '{name}'")]
    UnknownRequest {
        /// Name as received.
        name: String,
    },

    /// A request other than `checkVersion` arrived before negotiation.
    #[error("received '{name}' before the protocol version was negotiated")]
    NegotiationRequired {
        /// Name of the premature request.
        name: String,
    },

    /// The payload did not match the shape declared for its request name.
    #[error("malformed payload for '{name}': {source}")]
    MalformedPayload {
        /// Request name.
        name: String,
        /// Decoding failure.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// The program requires an incompatible protocol version.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A child process could not be started for a reason other than a
    /// missing executable.
    #[error("failed to spawn '{command}': {source}")]
    SpawnFailed {
        /// Command that was spawned.
        command: String,
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Writing program output to the broker's stdout failed.
    #[error("failed to write to stdout: {source}")]
    WriteStdout {
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The channel to the program failed or carried an undecodable frame.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl BrokerError {
    /// Exit status used when the session ends with this error.
    #[must_use]
    pub const fn exit_status(&self) -> i32 {
        1
    }

    /// Returns whether the error means the program broke the protocol.
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::UnknownRequest { .. }
                | Self::NegotiationRequired { .. }
                | Self::MalformedPayload { .. }
                | Self::Transport(TransportError::Decode { .. })
        )
    }

    /// One-line remediation advice for the operator, where there is one.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Version(error) => Some(error.remedy().hint()),
            Self::SpawnFailed { .. } => {
                Some("Check that the command is executable and the host can start processes")
            }
            _ if self.is_protocol_violation() => Some(
                "The program and tether disagree on the protocol; \
                 rebuild the program against a matching tether client library",
            ),
            _ => None,
        }
    }

    /// Creates a spawn failure.
    #[must_use]
    pub fn spawn_failed(command: impl Into<String>, source: io::Error) -> Self {
        Self::SpawnFailed {
            command: command.into(),
            source: Arc::new(source),
        }
    }
}
