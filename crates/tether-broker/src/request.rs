//! Typed request payloads.
//!
//! A [`Request`] arrives with an untyped JSON payload. [`HostRequest::parse`]
//! routes on the request name and decodes the payload into the shape that
//! name declares. Names that are not part of the protocol, and payloads that
//! do not fit their name, are protocol violations.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::error::BrokerError;
use crate::protocol::Request;
use crate::version::ProtocolVersion;

/// Ordered path segments; the first is the anchor.
pub type PathSegments = Vec<String>;

/// Request names understood by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum RequestName {
    /// Protocol version handshake.
    CheckVersion,
    /// Write text to the broker's stdout.
    WriteStdout,
    /// End the session with a status code.
    Exit,
    /// Write text to stdout and end the session with failure.
    Abort,
    /// Read a whole file as UTF-8.
    ReadFile,
    /// Overwrite a file.
    WriteFile,
    /// List regular files in a directory.
    ListFiles,
    /// List subdirectories of a directory.
    ListSubdirectories,
    /// Run a child process.
    Execute,
    /// Copy a file.
    CopyFile,
    /// Rename a file.
    MoveFile,
    /// Delete a file.
    DeleteFile,
    /// Classify a path.
    Stat,
    /// Create a directory.
    CreateDirectory,
    /// Remove a directory.
    RemoveDirectory,
    /// Create a session-owned temporary directory.
    CreateTemporaryDirectory,
    /// Perform an HTTP request.
    Http,
}

/// Payload of `writeFile`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFile {
    /// Target file.
    pub path: PathSegments,
    /// Full replacement contents.
    pub contents: String,
}

/// Payload of `copyFile` and `moveFile`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Existing file.
    pub source_path: PathSegments,
    /// Destination path.
    pub destination_path: PathSegments,
}

/// Payload of `createDirectory` and `removeDirectory`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryChange {
    /// Target directory.
    pub path: PathSegments,
    /// Whether to create parents, or remove contents.
    #[serde(default)]
    pub recursive: bool,
}

/// Payload of `execute`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteCommand {
    /// Program to run, looked up on `PATH` when not a path.
    pub command: String,
    /// Arguments passed verbatim.
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Directory the child starts in.
    pub working_directory: PathSegments,
}

/// Options of an `http` request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpOptions {
    /// HTTP method; defaults to `GET`.
    #[serde(default = "default_method")]
    pub method: String,
    /// Header name/value pairs, in order.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    #[serde(default)]
    pub body: Option<String>,
    /// Overall deadline for the exchange. Never read from the wire; set from
    /// the request's `timeout` so a worker that lost the race still ends.
    #[serde(skip)]
    pub deadline: Option<Duration>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            method: default_method(),
            headers: Vec::new(),
            body: None,
            deadline: None,
        }
    }
}

fn default_method() -> String {
    String::from("GET")
}

/// Payload of `http`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    /// Absolute URL.
    pub url: String,
    /// Method, headers and body.
    #[serde(default)]
    pub options: HttpOptions,
    /// Timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// A request with its payload decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    /// `checkVersion`.
    CheckVersion(ProtocolVersion),
    /// `writeStdout`.
    WriteStdout(String),
    /// `exit`.
    Exit(i32),
    /// `abort`.
    Abort(String),
    /// `readFile`.
    ReadFile(PathSegments),
    /// `writeFile`.
    WriteFile(WriteFile),
    /// `listFiles`.
    ListFiles(PathSegments),
    /// `listSubdirectories`.
    ListSubdirectories(PathSegments),
    /// `execute`.
    Execute(ExecuteCommand),
    /// `copyFile`.
    CopyFile(Transfer),
    /// `moveFile`.
    MoveFile(Transfer),
    /// `deleteFile`.
    DeleteFile(PathSegments),
    /// `stat`.
    Stat(PathSegments),
    /// `createDirectory`.
    CreateDirectory(DirectoryChange),
    /// `removeDirectory`.
    RemoveDirectory(DirectoryChange),
    /// `createTemporaryDirectory`.
    CreateTemporaryDirectory,
    /// `http`.
    Http(FetchRequest),
}

impl HostRequest {
    /// Decodes a raw request.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownRequest`] for names outside the protocol
    /// and [`BrokerError::MalformedPayload`] when the payload does not match
    /// the shape the name declares.
    pub fn parse(request: Request) -> Result<Self, BrokerError> {
        let (raw_name, value) = request.into_parts();
        let name: RequestName = raw_name
            .parse()
            .map_err(|_| BrokerError::UnknownRequest { name: raw_name })?;
        let decoded = match name {
            RequestName::CheckVersion => {
                let (major, minor) = payload(name, value)?;
                Self::CheckVersion(ProtocolVersion::new(major, minor))
            }
            RequestName::WriteStdout => Self::WriteStdout(payload(name, value)?),
            RequestName::Exit => Self::Exit(payload(name, value)?),
            RequestName::Abort => Self::Abort(payload(name, value)?),
            RequestName::ReadFile => Self::ReadFile(payload(name, value)?),
            RequestName::WriteFile => Self::WriteFile(payload(name, value)?),
            RequestName::ListFiles => Self::ListFiles(payload(name, value)?),
            RequestName::ListSubdirectories => Self::ListSubdirectories(payload(name, value)?),
            RequestName::Execute => Self::Execute(payload(name, value)?),
            RequestName::CopyFile => Self::CopyFile(payload(name, value)?),
            RequestName::MoveFile => Self::MoveFile(payload(name, value)?),
            RequestName::DeleteFile => Self::DeleteFile(payload(name, value)?),
            RequestName::Stat => Self::Stat(payload(name, value)?),
            RequestName::CreateDirectory => Self::CreateDirectory(payload(name, value)?),
            RequestName::RemoveDirectory => Self::RemoveDirectory(payload(name, value)?),
            RequestName::CreateTemporaryDirectory => Self::CreateTemporaryDirectory,
            RequestName::Http => Self::Http(payload(name, value)?),
        };
        Ok(decoded)
    }

    /// Returns the protocol name of this request.
    #[must_use]
    pub const fn name(&self) -> RequestName {
        match self {
            Self::CheckVersion(_) => RequestName::CheckVersion,
            Self::WriteStdout(_) => RequestName::WriteStdout,
            Self::Exit(_) => RequestName::Exit,
            Self::Abort(_) => RequestName::Abort,
            Self::ReadFile(_) => RequestName::ReadFile,
            Self::WriteFile(_) => RequestName::WriteFile,
            Self::ListFiles(_) => RequestName::ListFiles,
            Self::ListSubdirectories(_) => RequestName::ListSubdirectories,
            Self::Execute(_) => RequestName::Execute,
            Self::CopyFile(_) => RequestName::CopyFile,
            Self::MoveFile(_) => RequestName::MoveFile,
            Self::DeleteFile(_) => RequestName::DeleteFile,
            Self::Stat(_) => RequestName::Stat,
            Self::CreateDirectory(_) => RequestName::CreateDirectory,
            Self::RemoveDirectory(_) => RequestName::RemoveDirectory,
            Self::CreateTemporaryDirectory => RequestName::CreateTemporaryDirectory,
            Self::Http(_) => RequestName::Http,
        }
    }
}

fn payload<T: DeserializeOwned>(name: RequestName, value: Value) -> Result<T, BrokerError> {
    serde_json::from_value(value).map_err(|source| BrokerError::MalformedPayload {
        name: name.to_string(),
        source: Arc::new(source),
    })
}
