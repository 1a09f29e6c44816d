//! CLI argument definitions for tether.

use clap::{Parser, Subcommand};

/// Command-line interface for the tether broker.
#[derive(Parser, Debug)]
#[command(name = "tether", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// The action to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Structured subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Runs a program with access to host capabilities.
    Run {
        /// Prebuilt program artifact, or a source file to compile first.
        #[arg(value_name = "SCRIPT")]
        script: String,
        /// Arguments passed through to the program.
        #[arg(
            value_name = "ARG",
            num_args = 0..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        arguments: Vec<String>,
    },
}
