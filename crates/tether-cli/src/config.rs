//! Configuration loading helpers for the tether CLI.
//!
//! Configuration flags precede the subcommand. The helpers here peel them off
//! so `ortho_config` only sees flags it understands and clap only sees the
//! command tokens.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;

use tether_config::{CONFIG_CLI_FLAGS, Config};

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration from the already separated configuration flags.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let Some((flag, inline)) = text
        .strip_prefix("--")
        .map(|rest| match rest.split_once('=') {
            Some((name, _)) => (name, true),
            None => (rest, false),
        })
    else {
        return FlagAction::Stop;
    };
    if CONFIG_CLI_FLAGS
        .iter()
        .any(|known| known.strip_prefix("--") == Some(flag))
    {
        FlagAction::Include {
            needs_value: !inline,
        }
    } else {
        FlagAction::Stop
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by the configuration flags and their values.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name followed by the command tokens.
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut tokens = args.iter();
    let program: Vec<OsString> = tokens.next().cloned().into_iter().collect();
    let mut config_arguments = program.clone();
    let mut remaining = tokens.as_slice();

    while let Some((argument, rest)) = remaining.split_first() {
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                remaining = rest;
                if needs_value {
                    if let Some((value, after)) = remaining.split_first() {
                        config_arguments.push(value.clone());
                        remaining = after;
                    }
                }
            }
            FlagAction::Stop => break,
        }
    }

    let mut command_arguments = program;
    command_arguments.extend(remaining.iter().cloned());
    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os(values: &[&str]) -> Vec<OsString> {
        values.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case::inline("--log-filter=debug", FlagAction::Include { needs_value: false })]
    #[case::separate("--log-filter", FlagAction::Include { needs_value: true })]
    #[case::subcommand("run", FlagAction::Stop)]
    #[case::unknown("--unknown", FlagAction::Stop)]
    #[case::single_dash("-v", FlagAction::Stop)]
    fn flags_are_classified(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(classify(OsStr::new(argument)), expected);
    }

    #[test]
    fn config_flags_are_split_from_the_command() {
        let split = split_config_arguments(&os(&[
            "tether",
            "--log-filter",
            "debug",
            "--interpreter=/bin/sh",
            "run",
            "program",
            "--log-filter",
            "passed-through",
        ]));
        assert_eq!(
            split.config_arguments,
            os(&["tether", "--log-filter", "debug", "--interpreter=/bin/sh"])
        );
        assert_eq!(
            split.command_arguments,
            os(&["tether", "run", "program", "--log-filter", "passed-through"])
        );
    }

    #[test]
    fn empty_arguments_split_to_nothing() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert!(split.command_arguments.is_empty());
    }

    #[test]
    fn dangling_value_flag_is_kept() {
        let split = split_config_arguments(&os(&["tether", "--compiler"]));
        assert_eq!(split.config_arguments, os(&["tether", "--compiler"]));
        assert_eq!(split.command_arguments, os(&["tether"]));
    }
}
