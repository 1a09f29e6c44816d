//! Host-capability broker for programs without native OS access.
//!
//! The `tether-broker` crate hosts a program that cannot touch the operating
//! system itself. The program expresses every effectful operation it wants
//! as a named request; the broker performs the operation on its behalf and
//! answers with exactly one response. The program runs as a child process
//! and speaks JSON Lines over its standard streams.
//!
//! # Architecture
//!
//! A [`Session`] pulls requests from a [`Transport`] one at a time and hands
//! them to the [`Dispatcher`]. The dispatcher refuses everything until the
//! program has negotiated a compatible protocol version, then routes each
//! request by name. Path-bearing requests are resolved through the
//! [`PathConfiner`] first, so a path never escapes the directory its first
//! segment names. Recoverable problems travel back to the program as
//! [`Failure`] values; protocol violations and version mismatches become a
//! fatal [`BrokerError`]. Whatever ends the session, the same finalisation
//! releases the program and removes every temporary directory recorded in
//! the [`TempRegistry`].
//!
//! # Example
//!
//! ```rust,no_run
//! use camino::Utf8PathBuf;
//! use tether_broker::{ChildTransport, Flags, LaunchSpec, Session, SessionContext};
//!
//! let cwd = Utf8PathBuf::from("/work");
//! let flags = Flags::capture(vec![], cwd.clone());
//! let transport = ChildTransport::launch(&LaunchSpec::new("./program"), &flags)
//!     .expect("program starts");
//! let context = SessionContext::new(&cwd, "tether-", std::io::stdout());
//! let (end, _) = Session::new(transport, context).run();
//! std::process::exit(end.exit_code());
//! ```

mod confine;
pub mod dispatch;
mod error;
pub mod filesystem;
mod flags;
pub mod network;
pub mod process;
pub mod protocol;
mod registry;
pub mod request;
mod session;
pub mod transport;
pub mod version;

#[cfg(test)]
mod tests;

pub use self::confine::{ConfinementError, PathConfiner};
pub use self::dispatch::{Dispatcher, Outcome, Phase};
pub use self::error::BrokerError;
pub use self::flags::{Flags, Platform};
pub use self::network::{FetchReply, HttpClient, NetworkError, UreqClient};
pub use self::protocol::{Failure, IoCode, Request, Response};
pub use self::registry::{SweepReport, TempRegistry};
pub use self::session::{EndReason, Session, SessionContext, SessionEnd};
pub use self::transport::{
    ChildTransport, DEFAULT_LINE_LIMIT, JsonlTransport, LaunchSpec, Transport, TransportError,
};
pub use self::version::{IMPLEMENTED_VERSION, ProtocolVersion, VersionError};
