//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use tether_broker::TransportError;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to determine the working directory: {0}")]
    WorkingDirectory(io::Error),
    #[error("working directory {} is not valid UTF-8", .0.display())]
    NonUtf8WorkingDirectory(PathBuf),
    #[error("{script} is a source file but no compiler is configured (set --compiler)")]
    MissingCompiler { script: String },
    #[error("failed to create a directory for the compiled artifact: {0}")]
    ArtifactDirectory(io::Error),
    #[error("compiler '{compiler}' not found")]
    CompilerNotFound { compiler: String },
    #[error("failed to run compiler '{compiler}': {source}")]
    Compiler { compiler: String, source: io::Error },
    /// Sentinel for a failed compile; the compiler has reported its errors.
    #[error("compilation failed")]
    CompileFailed,
    #[error(transparent)]
    Launch(TransportError),
}

impl AppError {
    /// Returns whether the error has already been reported to the operator.
    pub(crate) const fn is_silent(&self) -> bool {
        matches!(self, Self::CompileFailed)
    }
}
