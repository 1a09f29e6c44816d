//! Channels between the broker and the hosted program.
//!
//! [`Transport`] is the seam the session drives: it yields requests one at a
//! time and accepts exactly one response per request. [`JsonlTransport`]
//! frames both directions as JSON Lines over any reader/writer pair, and
//! [`ChildTransport`] runs the program as a child process speaking that
//! framing on its stdio.

mod child;

use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::flags::Flags;
use crate::protocol::{Request, Response};

pub use child::{ChildTransport, LaunchSpec};

/// Tracing target for transport operations.
const TRANSPORT_TARGET: &str = "tether_broker::transport";

/// Failures of the channel to the hosted program.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Reading from the program failed.
    #[error("failed to read from program: {source}")]
    Read {
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Writing to the program failed.
    #[error("failed to write to program: {source}")]
    Write {
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A value could not be encoded as JSON.
    #[error("failed to encode message: {source}")]
    Encode {
        /// Underlying error.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// The program sent a line that is not a request.
    #[error("malformed request line {line:?}: {source}")]
    Decode {
        /// The offending line, trimmed.
        line: String,
        /// Underlying error.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// The program could not be started.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// Program that was launched.
        program: String,
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A standard stream of the child was not captured.
    #[error("failed to capture program {stream}")]
    MissingPipe {
        /// Stream name.
        stream: &'static str,
    },

    /// Waiting for the program to exit failed.
    #[error("failed to wait for program: {source}")]
    Wait {
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl TransportError {
    /// Returns whether the error is a launch failure caused by a missing
    /// executable.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Launch { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Request/response channel to the hosted program.
pub trait Transport {
    /// Returns the next request, or `None` once the program has closed its
    /// side of the channel.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel fails or carries a line that is not
    /// a request.
    fn next_request(&mut self) -> Result<Option<Request>, TransportError>;

    /// Sends the response for the most recent request.
    ///
    /// # Errors
    ///
    /// Returns an error when the response cannot be encoded or written.
    fn respond(&mut self, response: &Response) -> Result<(), TransportError>;

    /// Exit status to use when the program closed the channel without
    /// asking to exit.
    ///
    /// # Errors
    ///
    /// Returns an error when the status cannot be determined.
    fn completion_status(&mut self) -> Result<i32, TransportError> {
        Ok(0)
    }

    /// Releases the program. Called exactly once when the session ends.
    fn shutdown(&mut self) {}
}

/// Longest request line accepted by default, newline excluded.
pub const DEFAULT_LINE_LIMIT: usize = 64 * 1024 * 1024;

/// Characters of an offending line kept in a decode error.
const LINE_PREVIEW_CHARS: usize = 120;

/// JSON Lines framing over a reader/writer pair.
#[derive(Debug)]
pub struct JsonlTransport<R, W> {
    reader: R,
    writer: Option<W>,
    line: Vec<u8>,
    limit: usize,
}

impl<R: BufRead, W: Write> JsonlTransport<R, W> {
    /// Wraps a reader yielding requests and a writer accepting responses.
    #[must_use]
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: Some(writer),
            line: Vec::new(),
            limit: DEFAULT_LINE_LIMIT,
        }
    }

    /// Replaces the longest request line accepted, newline excluded.
    #[must_use]
    pub fn with_line_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sends the session flags as the first line.
    ///
    /// # Errors
    ///
    /// Returns an error when the flags cannot be encoded or written.
    pub fn send_flags(&mut self, flags: &Flags) -> Result<(), TransportError> {
        self.write_line(flags)
    }

    /// Closes the writing side so the program sees end of input.
    pub fn close_writer(&mut self) {
        drop(self.writer.take());
    }

    /// Returns the writer, if it has not been closed.
    #[must_use]
    pub const fn writer(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> Result<(), TransportError> {
        let mut encoded = serde_json::to_vec(value).map_err(|source| TransportError::Encode {
            source: Arc::new(source),
        })?;
        encoded.push(b'\n');
        let writer = self.writer.as_mut().ok_or_else(|| TransportError::Write {
            source: Arc::new(io::Error::from(io::ErrorKind::BrokenPipe)),
        })?;
        writer
            .write_all(&encoded)
            .and_then(|()| writer.flush())
            .map_err(|source| TransportError::Write {
                source: Arc::new(source),
            })
    }
}

impl<R: BufRead, W: Write> JsonlTransport<R, W> {
    /// Reads one line into `self.line`, stopping one byte past the limit.
    fn read_bounded_line(&mut self) -> Result<usize, TransportError> {
        self.line.clear();
        let budget = u64::try_from(self.limit)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        (&mut self.reader)
            .take(budget)
            .read_until(b'\n', &mut self.line)
            .map_err(|source| TransportError::Read {
                source: Arc::new(source),
            })
    }

    fn oversized_line(&self) -> TransportError {
        let preview: String = String::from_utf8_lossy(&self.line)
            .chars()
            .take(LINE_PREVIEW_CHARS)
            .collect();
        TransportError::Decode {
            line: preview,
            source: Arc::new(<serde_json::Error as serde::de::Error>::custom(format!(
                "request line exceeds {} bytes",
                self.limit
            ))),
        }
    }
}

impl<R: BufRead, W: Write> Transport for JsonlTransport<R, W> {
    fn next_request(&mut self) -> Result<Option<Request>, TransportError> {
        loop {
            let bytes = self.read_bounded_line()?;
            if bytes == 0 {
                debug!(target: TRANSPORT_TARGET, "program closed its request channel");
                return Ok(None);
            }
            if bytes > self.limit && self.line.last() != Some(&b'\n') {
                return Err(self.oversized_line());
            }
            let trimmed = self.line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_slice(trimmed)
                .map(Some)
                .map_err(|source| TransportError::Decode {
                    line: String::from_utf8_lossy(trimmed).into_owned(),
                    source: Arc::new(source),
                });
        }
    }

    fn respond(&mut self, response: &Response) -> Result<(), TransportError> {
        self.write_line(response)
    }
}
