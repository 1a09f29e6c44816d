//! Command-line runtime for the tether broker.
//!
//! The module owns argument parsing, configuration bootstrapping, artifact
//! preparation and the hosted session. It is exercised both from the binary
//! entrypoint and from tests where configuration loading and the output
//! streams can be substituted.

use std::env;
use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use tracing::debug;

use tether_broker::{BrokerError, ChildTransport, Flags, Session, SessionContext};
use tether_config::Config;

mod artifact;
mod cli;
mod config;
mod errors;
mod telemetry;


use cli::{Cli, CliCommand};
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
pub(crate) use errors::AppError;

/// Tracing target for CLI runtime events.
const CLI_TARGET: &str = "tether_cli";

/// Runs the CLI using the process arguments and the given output streams.
///
/// `stdout` receives only what the hosted program writes; every diagnostic
/// goes to `stderr`.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    mut stdout: W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let collected: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&collected);
    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, &mut stdout, stderr),
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| host(cli, &config, stdout));
    match result {
        Ok(Ok(status)) => exit_code_from_status(status),
        Ok(Err(fatal)) => {
            report_fatal(&fatal, stderr);
            exit_code_from_status(fatal.exit_status())
        }
        Err(error) if error.is_silent() => ExitCode::FAILURE,
        Err(error) => {
            drop(writeln!(stderr, "tether: {error}"));
            ExitCode::FAILURE
        }
    }
}

/// Prepares and hosts the program. The inner result carries the program's
/// exit status or the fatal error that ended its session.
fn host<W: Write>(
    cli: Cli,
    config: &Config,
    stdout: W,
) -> Result<Result<i32, BrokerError>, AppError> {
    telemetry::initialise(config)?;
    let CliCommand::Run { script, arguments } = cli.command;

    let cwd = env::current_dir()
        .map_err(AppError::WorkingDirectory)
        .and_then(|path| Utf8PathBuf::from_path_buf(path).map_err(AppError::NonUtf8WorkingDirectory))?;
    let mut context = SessionContext::new(&cwd, config.temp_prefix(), stdout);

    let spec = artifact::prepare(&cwd.join(&script), config, context.registry_mut())?;
    let flags = Flags::capture(arguments, cwd);
    let transport = ChildTransport::launch(&spec, &flags).map_err(AppError::Launch)?;
    debug!(target: CLI_TARGET, pid = transport.id(), script = %script, "program launched");

    let (end, _) = Session::new(transport, context).run();
    Ok(match end.reason.fatal() {
        Some(fatal) => Err(fatal.clone()),
        None => Ok(end.exit_code()),
    })
}

fn report_usage<W: Write, E: Write>(
    error: &clap::Error,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode {
    if error.use_stderr() {
        drop(write!(stderr, "{}", error.render()));
        ExitCode::FAILURE
    } else {
        drop(write!(stdout, "{}", error.render()));
        ExitCode::SUCCESS
    }
}

fn report_fatal<E: Write>(error: &BrokerError, stderr: &mut E) {
    drop(writeln!(stderr, "tether: {error}"));
    if let Some(hint) = error.hint() {
        drop(writeln!(stderr, "hint: {hint}"));
    }
}

fn exit_code_from_status(status: i32) -> ExitCode {
    u8::try_from(status).map_or(ExitCode::FAILURE, ExitCode::from)
}
