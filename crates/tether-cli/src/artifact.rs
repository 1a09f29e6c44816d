//! Turning the `run` script into something that can be launched.
//!
//! A script whose extension matches the configured source extension is
//! compiled first, into a temporary directory owned by the session so it is
//! removed with the rest. Anything else is treated as a ready artifact.

use std::io;
use std::process::{Command, Stdio};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use tether_broker::{LaunchSpec, TempRegistry};
use tether_config::Config;

use crate::AppError;

/// Tracing target for artifact preparation.
const ARTIFACT_TARGET: &str = "tether_cli::artifact";

/// File name of the compiled artifact inside its temporary directory.
const ARTIFACT_NAME: &str = "main";

/// Resolves `script` to a launchable artifact, compiling it when needed.
pub(crate) fn prepare(
    script: &Utf8Path,
    config: &Config,
    registry: &mut TempRegistry,
) -> Result<LaunchSpec, AppError> {
    let artifact = if is_source(script, config) {
        compile(script, config, registry)?
    } else {
        script.to_path_buf()
    };
    Ok(launch_spec(&artifact, config))
}

fn is_source(script: &Utf8Path, config: &Config) -> bool {
    script.extension() == Some(config.source_extension())
}

fn compile(
    script: &Utf8Path,
    config: &Config,
    registry: &mut TempRegistry,
) -> Result<Utf8PathBuf, AppError> {
    let compiler = config.compiler().ok_or_else(|| AppError::MissingCompiler {
        script: script.to_string(),
    })?;
    let output = registry
        .create()
        .map_err(AppError::ArtifactDirectory)?
        .join(ARTIFACT_NAME);
    let source_dir = script.parent().unwrap_or(Utf8Path::new("."));

    debug!(
        target: ARTIFACT_TARGET,
        compiler,
        source = %script,
        output = %output,
        "compiling program"
    );
    let status = Command::new(compiler)
        .arg(script)
        .arg(&output)
        .current_dir(source_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(io::stderr()))
        .status()
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => AppError::CompilerNotFound {
                compiler: compiler.to_owned(),
            },
            _ => AppError::Compiler {
                compiler: compiler.to_owned(),
                source,
            },
        })?;
    if status.success() {
        Ok(output)
    } else {
        debug!(target: ARTIFACT_TARGET, ?status, "compiler failed");
        Err(AppError::CompileFailed)
    }
}

fn launch_spec(artifact: &Utf8Path, config: &Config) -> LaunchSpec {
    match config.interpreter() {
        Some(interpreter) => LaunchSpec::new(interpreter).arg(artifact.as_str()),
        None => LaunchSpec::new(artifact.as_str()),
    }
}
