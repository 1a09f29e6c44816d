//! Wire types exchanged with the hosted program.
//!
//! The program writes one [`Request`] per line on its stdout and reads one
//! [`Response`] per line on its stdin. Failures that the program is expected
//! to handle travel as [`Failure`] values inside an error response; they are
//! never fatal to the session.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::confine::ConfinementError;

/// A named request received from the hosted program.
///
/// # Example
///
/// ```
/// use tether_broker::protocol::Request;
///
/// let request: Request = serde_json::from_str(r#"{"name":"stat","value":["."]}"#).unwrap();
/// assert_eq!(request.name(), "stat");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    name: String,
    #[serde(default)]
    value: Value,
}

impl Request {
    /// Creates a request with the given name and payload.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Returns the request name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the request payload.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the request, returning its name and payload.
    #[must_use]
    pub fn into_parts(self) -> (String, Value) {
        (self.name, self.value)
    }
}

/// The single reply sent for each request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// The request succeeded.
    Ok {
        /// Request-specific success payload.
        value: Value,
    },
    /// The request failed in a way the program can handle.
    Error {
        /// Structured failure description.
        error: Failure,
    },
}

impl Response {
    /// Success with a `null` payload.
    #[must_use]
    pub const fn unit() -> Self {
        Self::Ok { value: Value::Null }
    }

    /// Success carrying `value`.
    #[must_use]
    pub fn ok(value: impl Into<Value>) -> Self {
        Self::Ok {
            value: value.into(),
        }
    }

    /// Failure response.
    #[must_use]
    pub const fn failure(error: Failure) -> Self {
        Self::Error { error }
    }

    /// Returns whether this is a success response.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Returns the success payload, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Ok { value } => Some(value),
            Self::Error { .. } => None,
        }
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&Failure> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { error } => Some(error),
        }
    }
}

impl From<Result<Value, Failure>> for Response {
    fn from(result: Result<Value, Failure>) -> Self {
        match result {
            Ok(value) => Self::Ok { value },
            Err(error) => Self::Error { error },
        }
    }
}

/// Recoverable failure categories reported to the program.
///
/// The `kind` field discriminates the variants on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// A path segment escaped its anchor, or no segments were given.
    Confinement {
        /// The offending segment.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        segment: Option<String>,
        /// Human-readable description.
        message: String,
    },
    /// A host I/O operation failed.
    Io {
        /// Portable classification of the underlying error.
        code: IoCode,
        /// Human-readable description.
        message: String,
    },
    /// A child process exited with a non-zero code.
    Exited {
        /// Exit code reported by the operating system.
        code: i32,
        /// Captured standard error, decoded lossily.
        stderr: String,
    },
    /// A child process was terminated by a signal.
    Terminated {
        /// Signal number, where the platform reports one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal: Option<i32>,
    },
    /// The executable named by an `execute` request does not exist.
    ExecutableNotFound,
    /// A network fetch did not complete within its timeout.
    Timeout,
    /// A network fetch failed for any reason other than a timeout.
    Network {
        /// Human-readable description.
        message: String,
    },
}

impl Failure {
    /// Builds an I/O failure from a host error.
    #[must_use]
    pub fn io(error: &io::Error) -> Self {
        Self::Io {
            code: IoCode::from(error.kind()),
            message: error.to_string(),
        }
    }

    /// Builds an I/O failure with an explicit code and message.
    #[must_use]
    pub fn io_with(code: IoCode, message: impl Into<String>) -> Self {
        Self::Io {
            code,
            message: message.into(),
        }
    }

    /// Builds a network failure.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}

impl From<ConfinementError> for Failure {
    fn from(error: ConfinementError) -> Self {
        Self::Confinement {
            segment: error.segment().map(str::to_owned),
            message: error.to_string(),
        }
    }
}

impl From<io::Error> for Failure {
    fn from(error: io::Error) -> Self {
        Self::io(&error)
    }
}

/// Portable classification of host I/O errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IoCode {
    /// The target does not exist.
    NotFound,
    /// The operation was not permitted.
    PermissionDenied,
    /// The target already exists.
    AlreadyExists,
    /// A directory was expected.
    NotADirectory,
    /// A non-directory was expected.
    IsADirectory,
    /// The directory still has entries.
    DirectoryNotEmpty,
    /// Data was not in the expected format, such as non-UTF-8 file contents.
    InvalidData,
    /// Any other condition.
    Other,
}

impl From<io::ErrorKind> for IoCode {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            io::ErrorKind::NotADirectory => Self::NotADirectory,
            io::ErrorKind::IsADirectory => Self::IsADirectory,
            io::ErrorKind::DirectoryNotEmpty => Self::DirectoryNotEmpty,
            io::ErrorKind::InvalidData => Self::InvalidData,
            _ => Self::Other,
        }
    }
}
