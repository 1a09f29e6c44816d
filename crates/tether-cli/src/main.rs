//! CLI entrypoint for the tether host-capability broker.
//!
//! The binary delegates to [`tether_cli::run`], which loads configuration,
//! prepares the program artifact, and hosts it until the session ends.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stderr = io::stderr();
    tether_cli::run(std::env::args_os(), io::stdout(), &mut stderr)
}
