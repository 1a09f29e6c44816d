//! HTTP fetch with an optional timeout race.
//!
//! The fetch itself is delegated to an [`HttpClient`]. When the request
//! carries a timeout, the fetch runs on a worker thread and the caller waits
//! on a channel; if the timer wins, the worker is abandoned and its eventual
//! result is discarded.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::protocol::Failure;
use crate::request::{FetchRequest, HttpOptions};

/// Tracing target for network operations.
const NETWORK_TARGET: &str = "tether_broker::network";

/// Time an abandoned worker may outlive the race before its own deadline.
const WORKER_GRACE: Duration = Duration::from_secs(1);

/// A completed HTTP exchange, whatever its status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body, fully buffered.
    pub body: String,
}

/// Failure to complete an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NetworkError {
    message: String,
}

impl NetworkError {
    /// Creates an error with the given description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<NetworkError> for Failure {
    fn from(error: NetworkError) -> Self {
        Self::network(error.message)
    }
}

/// Performs HTTP requests.
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Sends one request and buffers the response.
    ///
    /// # Errors
    ///
    /// Returns an error when no HTTP response was received. Error status
    /// codes are replies, not errors.
    fn fetch(&self, url: &str, options: &HttpOptions) -> Result<FetchReply, NetworkError>;
}

/// Blocking client backed by `ureq`.
#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    /// Creates a client with a fresh connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqClient {
    fn fetch(&self, url: &str, options: &HttpOptions) -> Result<FetchReply, NetworkError> {
        let mut base = self.agent.request(&options.method, url);
        if let Some(deadline) = options.deadline {
            base = base.timeout(deadline);
        }
        let request = options
            .headers
            .iter()
            .fold(base, |request, (name, value)| request.set(name, value));
        let result = match &options.body {
            Some(body) => request.send_string(body),
            None => request.call(),
        };
        let response = match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(NetworkError::new(transport.to_string()));
            }
        };
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|error| NetworkError::new(format!("failed to read response body: {error}")))?;
        Ok(FetchReply { status, body })
    }
}

/// Performs `request`, racing it against its timeout when one is given.
///
/// # Errors
///
/// Returns [`Failure::Timeout`] when the timer fires first and
/// [`Failure::Network`] for every other failure.
pub fn fetch(client: &Arc<dyn HttpClient>, request: FetchRequest) -> Result<FetchReply, Failure> {
    let FetchRequest {
        url,
        mut options,
        timeout,
    } = request;
    debug!(
        target: NETWORK_TARGET,
        url = %url,
        method = %options.method,
        timeout_ms = ?timeout,
        "fetching"
    );
    let Some(millis) = timeout else {
        return client.fetch(&url, &options).map_err(Failure::from);
    };

    let budget = Duration::from_millis(millis);
    options.deadline = Some(budget.saturating_add(WORKER_GRACE));
    let (sender, receiver) = mpsc::channel();
    let worker = Arc::clone(client);
    thread::Builder::new()
        .name(String::from("tether-http"))
        .spawn(move || {
            // The receiver is gone once the timer has won.
            drop(sender.send(worker.fetch(&url, &options)));
        })
        .map_err(|error| Failure::network(format!("failed to start fetch worker: {error}")))?;

    match receiver.recv_timeout(budget) {
        Ok(result) => result.map_err(Failure::from),
        Err(RecvTimeoutError::Timeout) => {
            debug!(target: NETWORK_TARGET, timeout_ms = millis, "fetch timed out");
            Err(Failure::Timeout)
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(Failure::network("fetch worker exited without a reply"))
        }
    }
}
