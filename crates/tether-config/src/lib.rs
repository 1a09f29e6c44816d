//! Shared configuration for the tether host-capability broker.
//!
//! Configuration is layered with `ortho_config`: built-in defaults, then an
//! optional TOML file selected with `--config-path` (or `TETHER_CONFIG_PATH`),
//! then `TETHER_*` environment variables, then command-line flags. The
//! resulting [`Config`] controls logging, the prefix used for session
//! temporary directories, and how scripts are turned into runnable artifacts.

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_SOURCE_EXTENSION, DEFAULT_TEMP_PREFIX, default_log_filter,
    default_log_filter_string, default_log_format, default_source_extension_string,
    default_temp_prefix_string,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Command-line flags understood by the configuration loader.
///
/// These must precede the `run` subcommand. Keep the list in sync with the
/// fields of [`Config`].
pub const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--temp-prefix",
    "--source-extension",
    "--compiler",
    "--interpreter",
];

/// Runtime configuration for the broker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TETHER")]
pub struct Config {
    /// Tracing filter expression (for example `debug` or `tether_broker=trace`).
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for broker diagnostics.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Prefix for temporary directories created on behalf of the program.
    #[ortho_config(default = default_temp_prefix_string())]
    pub temp_prefix: String,
    /// Extension identifying scripts that must be compiled before running.
    #[ortho_config(default = default_source_extension_string())]
    pub source_extension: String,
    /// Compiler invoked as `compiler <source> <output>` for source scripts.
    #[serde(default)]
    pub compiler: Option<String>,
    /// Interpreter used to launch artifacts instead of executing them directly.
    #[serde(default)]
    pub interpreter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            temp_prefix: default_temp_prefix_string(),
            source_extension: default_source_extension_string(),
            compiler: None,
            interpreter: None,
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Diagnostic output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Prefix for session temporary directories.
    #[must_use]
    pub const fn temp_prefix(&self) -> &str {
        self.temp_prefix.as_str()
    }

    /// Extension marking scripts as source.
    #[must_use]
    pub fn source_extension(&self) -> &str {
        self.source_extension.trim_start_matches('.')
    }

    /// Compiler program for source scripts, if configured.
    #[must_use]
    pub fn compiler(&self) -> Option<&str> {
        self.compiler.as_deref()
    }

    /// Interpreter used to launch artifacts, if configured.
    #[must_use]
    pub fn interpreter(&self) -> Option<&str> {
        self.interpreter.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::Compact);
        assert_eq!(config.temp_prefix(), "tether-");
        assert_eq!(config.source_extension(), "src");
        assert!(config.compiler().is_none());
        assert!(config.interpreter().is_none());
    }

    #[test]
    fn source_extension_ignores_leading_dot() {
        let config = Config {
            source_extension: ".elm".into(),
            ..Config::default()
        };
        assert_eq!(config.source_extension(), "elm");
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSON", LogFormat::Json)]
    #[case("compact", LogFormat::Compact)]
    #[case("Compact", LogFormat::Compact)]
    fn log_format_parses_case_insensitively(#[case] text: &str, #[case] expected: LogFormat) {
        let parsed: LogFormat = text.parse().expect("log format should parse");
        assert_eq!(parsed, expected);
    }

    #[test]
    fn log_format_rejects_unknown_values() {
        assert!("pretty".parse::<LogFormat>().is_err());
    }

    #[test]
    fn log_format_displays_snake_case() {
        assert_eq!(LogFormat::Json.to_string(), "json");
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }
}
